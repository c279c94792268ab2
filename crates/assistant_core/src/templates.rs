//! Placeholder answers used when no answering backend is configured.

use shared::domain::AnswerMode;

pub const WELCOME_MESSAGE: &str = "Hello! I am your Smart Research Assistant. Upload your notes, and I can help you prepare for your exams. Try asking \"Explain the key concepts of Chapter 1 in 5 marks\".";

pub const CONCISE_ANSWER: &str =
    "Here is the information from your notes: [Relevant excerpt would appear here].";

pub const FIVE_MARK_ANSWER: &str = "**Answer (5 Marks):**

1. **Definition**: [Concept] is defined as...
2. **Key Feature 1**: It enables...
3. **Key Feature 2**: It ensures...
4. **Example**: For instance...
5. **Conclusion**: Therefore, it is critical for...";

pub const TEN_MARK_ANSWER: &str = "**Detailed Explanation (10 Marks):**

**Introduction**
[Concept] is a fundamental aspect of...

**Core Principles**
- Principle A: ...
- Principle B: ...

**Detailed Analysis**
The system operates by...

**Comparison**
Compared to traditional methods...

**Conclusion**
In summary...";

/// Section headings each structured answer is expected to carry, in order.
pub fn expected_sections(mode: AnswerMode) -> &'static [&'static str] {
    match mode {
        AnswerMode::Concise => &[],
        AnswerMode::FiveMark => &[
            "Definition",
            "Key Feature 1",
            "Key Feature 2",
            "Example",
            "Conclusion",
        ],
        AnswerMode::TenMark => &[
            "Introduction",
            "Core Principles",
            "Detailed Analysis",
            "Comparison",
            "Conclusion",
        ],
    }
}

pub fn canned_answer(mode: AnswerMode) -> &'static str {
    match mode {
        AnswerMode::Concise => CONCISE_ANSWER,
        AnswerMode::FiveMark => FIVE_MARK_ANSWER,
        AnswerMode::TenMark => TEN_MARK_ANSWER,
    }
}
