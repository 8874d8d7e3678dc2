//! Prompt templates exposed via Model Context Protocol
//!
//! Prompts are pure text generators: their arguments are validated like tool
//! arguments and the rendered text becomes a single user message on the wire.

use crate::capability::{
    handler_fn, Arguments, Domain, FieldKind, FieldSpec, HandlerDescriptor, Outcome,
    RegistrationError, Registry, Schema, TypedValue,
};

pub fn register_prompts(registry: &mut Registry) -> Result<(), RegistrationError> {
    registry.register(
        Domain::Generator,
        HandlerDescriptor::new(
            "tech_interview",
            "Generates questions for a technical interview",
            handler_fn(|args| async move { Ok(Outcome::text(tech_interview(&args))) }),
        )
        .with_schema(
            Schema::new()
                .field(
                    FieldSpec::new("role", FieldKind::String)
                        .required()
                        .describe("Role for the interview (frontend, backend, fullstack, devops)"),
                )
                .field(
                    FieldSpec::new("level", FieldKind::String)
                        .required()
                        .describe("Experience level (junior, mid, senior)"),
                )
                .field(
                    FieldSpec::new("technology", FieldKind::String)
                        .describe("Specific technology"),
                ),
        ),
    )?;

    registry.register(
        Domain::Generator,
        HandlerDescriptor::new(
            "architecture_review",
            "Generates a prompt for an architecture review",
            handler_fn(|args| async move { Ok(Outcome::text(architecture_review(&args))) }),
        )
        .with_schema(
            Schema::new()
                .field(
                    FieldSpec::new("system_type", FieldKind::String)
                        .required()
                        .describe("Kind of system (web, mobile, microservices, ...)"),
                )
                .field(
                    FieldSpec::new("scale", FieldKind::String)
                        .required()
                        .describe("Expected scale (small, medium, large)"),
                ),
        ),
    )?;

    registry.register(
        Domain::Generator,
        HandlerDescriptor::new(
            "debug_helper",
            "Structures a systematic debugging session",
            handler_fn(|args| async move { Ok(Outcome::text(debug_helper(&args))) }),
        )
        .with_schema(
            Schema::new()
                .field(
                    FieldSpec::new("problem_description", FieldKind::String)
                        .required()
                        .describe("Description of the problem"),
                )
                .field(
                    FieldSpec::new("technology_stack", FieldKind::String)
                        .describe("Technology stack involved"),
                ),
        ),
    )?;

    registry.register(
        Domain::Generator,
        HandlerDescriptor::new(
            "code_review",
            "Generates a prompt for a code review",
            handler_fn(|args| async move { Ok(Outcome::text(code_review(&args))) }),
        )
        .with_schema(
            Schema::new()
                .field(
                    FieldSpec::new("language", FieldKind::String)
                        .required()
                        .describe("Programming language"),
                )
                .field(
                    FieldSpec::new("code", FieldKind::String)
                        .required()
                        .describe("Code to review"),
                ),
        ),
    )?;

    registry.register(
        Domain::Generator,
        HandlerDescriptor::new(
            "explain_concept",
            "Generates a prompt explaining a technical concept",
            handler_fn(|args| async move { Ok(Outcome::text(explain_concept(&args))) }),
        )
        .with_schema(
            Schema::new()
                .field(
                    FieldSpec::new("concept", FieldKind::String)
                        .required()
                        .describe("Concept to explain"),
                )
                .field(
                    FieldSpec::new("level", FieldKind::String)
                        .default_value(TypedValue::String("intermediate".to_string()))
                        .describe("Experience level (beginner, intermediate, advanced)"),
                ),
        ),
    )?;

    Ok(())
}

fn arg<'a>(args: &'a Arguments, name: &str) -> &'a str {
    args.str(name).unwrap_or_default()
}

pub fn tech_interview(args: &Arguments) -> String {
    let mut prompt = format!(
        "Write questions for a technical interview:\n\n\
         **Candidate profile:**\n\
         - Role: {}\n\
         - Level: {}",
        arg(args, "role"),
        arg(args, "level"),
    );

    if let Some(technology) = args.str("technology") {
        prompt.push_str(&format!("\n- Specific technology: {technology}"));
    }

    prompt.push_str(
        "\n\n**Cover questions about:**\n\
         1. Core technical knowledge\n\
         2. Hands-on experience and projects\n\
         3. Problem solving\n\
         4. Architecture and design\n\
         5. Best practices\n\
         6. Hypothetical situations\n\n\
         **Format:**\n\
         - 10-15 questions of increasing difficulty\n\
         - Include coding questions where appropriate\n\
         - Provide evaluation criteria for each question",
    );
    prompt
}

pub fn architecture_review(args: &Arguments) -> String {
    format!(
        "Review the architecture of a {} system built for {} scale:\n\n\
         **Aspects to evaluate:**\n\n\
         1. **Overall architecture**\n\
         \x20  - Architectural patterns in use\n\
         \x20  - Separation of concerns\n\
         \x20  - Scalability and maintainability\n\n\
         2. **Technical components**\n\
         \x20  - Databases and persistence\n\
         \x20  - APIs and service communication\n\
         \x20  - Authentication and authorization\n\
         \x20  - Error handling and logging\n\n\
         3. **Operations**\n\
         \x20  - Deployment strategy\n\
         \x20  - Monitoring and observability\n\
         \x20  - Backup and recovery\n\
         \x20  - Security\n\n\
         4. **Performance**\n\
         \x20  - Optimizations in place\n\
         \x20  - Potential bottlenecks\n\
         \x20  - Caching strategies\n\n\
         **Provide:**\n\
         - A detailed analysis of each aspect\n\
         - Specific improvement recommendations\n\
         - Architectural alternatives where appropriate\n\
         - Cost and complexity considerations",
        arg(args, "system_type"),
        arg(args, "scale"),
    )
}

pub fn debug_helper(args: &Arguments) -> String {
    let mut prompt = format!(
        "Help debug the following problem:\n\n**Problem description:**\n{}",
        arg(args, "problem_description"),
    );

    if let Some(stack) = args.str("technology_stack") {
        prompt.push_str(&format!("\n\n**Technology stack:**\n{stack}"));
    }

    prompt.push_str(
        "\n\n**Systematic debugging process:**\n\n\
         1. **Reproduce the problem**\n\
         \x20  - How can the failure be reproduced consistently?\n\
         \x20  - Under which conditions does it occur?\n\n\
         2. **Gather information**\n\
         \x20  - Which logs or error messages are available?\n\
         \x20  - Which debugging tools can be used?\n\n\
         3. **Initial hypotheses**\n\
         \x20  - What are the most likely causes?\n\
         \x20  - Which components are involved?\n\n\
         4. **Investigation strategy**\n\
         \x20  - What should be checked first?\n\
         \x20  - How can the problem be isolated?\n\n\
         5. **Fix and prevention**\n\
         \x20  - How is the problem resolved?\n\
         \x20  - How is a recurrence prevented?\n\n\
         Provide a detailed step-by-step action plan.",
    );
    prompt
}

pub fn code_review(args: &Arguments) -> String {
    let language = arg(args, "language");
    format!(
        "Please review this {language} code:\n\n\
         ```{language}\n{}\n```\n\n\
         Evaluate:\n\
         1. Readability and style\n\
         2. Potential bugs or issues\n\
         3. Performance\n\
         4. Best practices\n\
         5. Suggested improvements\n\n\
         Give constructive, specific feedback.",
        arg(args, "code"),
    )
}

pub fn explain_concept(args: &Arguments) -> String {
    format!(
        "Explain the concept \"{}\" for someone at {} level.\n\n\
         Include:\n\
         1. A clear, concise definition\n\
         2. Practical examples\n\
         3. Common use cases\n\
         4. Related concepts\n\
         5. Further resources\n\n\
         Adapt the language and depth to the given level.",
        arg(args, "concept"),
        arg(args, "level"),
    )
}
