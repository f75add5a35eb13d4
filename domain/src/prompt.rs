//! Prompt templates for the refinement flow.

use crate::feedback::AdvisorFeedback;
use crate::plan::Task;

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    fn context_block(task: &Task) -> &str {
        task.context.as_deref().unwrap_or("No additional context.")
    }

    /// Prompt for the melder's initial draft.
    pub fn initial_plan(task: &Task) -> String {
        format!(
            r#"You are the melder, a planning expert. Produce a comprehensive, actionable plan for the task below. It will be reviewed by several independent advisors.

## Task
{task}

## Additional Context
{context}

## Instructions
Structure the plan with: an overview of the approach, numbered implementation steps, important considerations, risks with mitigations, and dependencies.

Format your response as:

## Plan

[Your structured plan here]

Be specific and thorough."#,
            task = task.description,
            context = Self::context_block(task),
        )
    }

    /// Prompt every advisor receives — identical across the pool.
    pub fn advisor_review(task: &Task, plan: &str) -> String {
        format!(
            r#"You are an independent advisor reviewing a plan. Provide constructive, substantive feedback.

## Task Context
{task}

## Current Plan
{plan}

## Additional Context
{context}

## Instructions
Respond with these sections:
1. **Summary**: your overall assessment in a sentence or two
2. **Risks**: potential issues the plan does not address
3. **Improvements**: specific changes that would make the plan better
4. **Missing Requirements**: elements that should be present but are not
5. **Questions**: anything that must be clarified before execution

Use bullet points inside each section. Focus on substance, not wording."#,
            task = task.description,
            plan = plan,
            context = Self::context_block(task),
        )
    }

    /// Prompt for a synthesis round.
    pub fn synthesis(task: &Task, plan: &str, feedback: &[&AdvisorFeedback], round: u32) -> String {
        let mut feedback_block = String::new();
        for item in feedback {
            feedback_block.push_str(&format!(
                "## {} Feedback\n{}\n\n",
                item.advisor.to_uppercase(),
                if item.raw.is_empty() {
                    "No feedback available."
                } else {
                    &item.raw
                }
            ));
        }

        format!(
            r#"You are the melder. Advisors have reviewed your current plan; fold their input into an improved revision. This is round {round}.

## Task
{task}

## Additional Context
{context}

## Current Plan
{plan}

## Advisor Feedback
{feedback}

## Instructions
1. Decide for each piece of feedback: ACCEPT, REJECT, or DEFER
2. Apply the accepted changes to the plan
3. Report honestly on convergence

Format your response as:

## Decision Log
- ACCEPTED: [feedback] - [reason]
- REJECTED: [feedback] - [reason]
- DEFERRED: [feedback] - [reason for postponing]

## Updated Plan
[The improved plan]

## Convergence Assessment
```json
{{
    "STATUS": "CONTINUING" or "CONVERGED",
    "CHANGES_MADE": <number of substantive changes>,
    "OPEN_ITEMS": <number of unresolved issues>,
    "DEFERRED_ITEMS": <number of deferred items>,
    "RATIONALE": "<brief explanation>"
}}
```

Only report CONVERGED when there are no substantive improvements left and OPEN_ITEMS is 0."#,
            round = round,
            task = task.description,
            context = Self::context_block(task),
            plan = plan,
            feedback = feedback_block.trim_end(),
        )
    }
}
