//! `medintake chat` — Interactive or single-message intake session.

use std::io::Write;
use std::path::Path;
use medintake_agent::{ClinicalSummary, IntakeSession, TurnInput, TurnReply};
use medintake_config::AppConfig;
use medintake_core::media::{ArtifactKind, MediaArtifact};
use medintake_core::message::SessionId;
use medintake_core::session::{Mode, OperatorRole};
use tokio::io::{AsyncBufReadExt, BufReader};
use super::{Runtime, build_runtime, require_api_key};

pub async fn run(
    message: Option<String>,
    role: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    require_api_key(&config)?;

    let role: OperatorRole = role
        .unwrap_or_else(|| config.intake.default_role.clone())
        .parse()?;
    let id = match session {
        Some(s) => SessionId::parse(&s)?,
        None => SessionId::new(),
    };
    let mut session = IntakeSession::with_id(id, role);

    let runtime = build_runtime(config)?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let reply = runtime.agent.handle_turn(&mut session, TurnInput::text(msg)).await;
        eprint!("\r              \r");
        print_reply(&reply);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         MedIntake — Intake Assistant         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", runtime.config.default_provider);
    println!("  Model:     {}", runtime.config.default_model);
    println!("  Role:      {role}");
    println!("  Session:   {}", session.id);
    println!();
    println!("  Commands:  /upload <file>   attach a report or image to your next message");
    println!("             /audio <file>    send a voice note");
    println!("             /summary         summarize the consultation so far");
    println!("             /replies         suggest quick replies");
    println!("             exit             quit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_context: Option<String> = None;
    let mut titled = false;
    let mut unsaved = 0;

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt()?;
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }

        let user_text = match line.split_once(' ').unwrap_or((line, "")) {
            ("/upload", path) => {
                pending_context = attach(&runtime, path.trim()).await;
                prompt()?;
                continue;
            }
            ("/audio", path) => match voice_note(&runtime, path.trim()).await {
                Some(text) => text,
                None => {
                    prompt()?;
                    continue;
                }
            },
            ("/summary", _) => {
                let summary = runtime.agent.summarize(&mut session).await;
                print_summary(&summary);
                prompt()?;
                continue;
            }
            ("/replies", _) => {
                let history = runtime.agent.history(&session).await;
                let replies = runtime.assist.smart_replies(&history).await;
                println!("  Quick replies: {}", replies.join(" | "));
                prompt()?;
                continue;
            }
            _ => line.to_string(),
        };

        if !titled {
            let title = runtime.assist.generate_chat_title(&user_text).await;
            println!("  [{title}]");
            titled = true;
        }

        let mut input = TurnInput::text(user_text);
        if let Some(context) = pending_context.take() {
            input = input.with_context(context);
        }

        eprint!("  ...");
        let reply = runtime.agent.handle_turn(&mut session, input).await;
        eprint!("\r     \r");
        print_reply(&reply);
        if !reply.saved {
            unsaved += 1;
        }

        if reply.mode == Mode::Summarizing {
            break;
        }
        prompt()?;
    }

    println!();
    if unsaved == 0 {
        println!("  Session saved as {}", session.id);
    } else {
        println!("  Session {}: {unsaved} turn(s) could not be saved", session.id);
    }
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn load(path: &str) -> Option<MediaArtifact> {
    if path.is_empty() {
        eprintln!("  [Usage] give a file path");
        return None;
    }
    match MediaArtifact::from_path(Path::new(path)).await {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            eprintln!("  [Error] {e}");
            None
        }
    }
}

async fn attach(runtime: &Runtime, path: &str) -> Option<String> {
    let artifact = load(path).await?;
    let context = runtime.preprocessor.process(&artifact).await;
    println!(
        "  Attached {} ({} chars of context). It will accompany your next message.",
        artifact.file_name,
        context.chars().count()
    );
    Some(context)
}

async fn voice_note(runtime: &Runtime, path: &str) -> Option<String> {
    let artifact = load(path).await?;
    if artifact.kind() != ArtifactKind::Audio {
        eprintln!("  [Error] {} is not an audio file ({})", artifact.file_name, artifact.mime_type);
        return None;
    }
    let text = runtime.preprocessor.transcribe(&artifact).await;
    println!("  You (voice) > {text}");
    Some(text)
}

fn print_reply(reply: &TurnReply) {
    if !reply.saved {
        eprintln!("  [Warning] This turn was not saved to the session history.");
    }
    println!();
    for line in reply.text.lines() {
        println!("  Assistant > {line}");
    }
    for url in &reply.report_refs {
        println!("  Report:     {url}");
    }
    if let Some(summary) = &reply.summary {
        print_summary(summary);
    }
    println!();
}

fn print_summary(summary: &ClinicalSummary) {
    println!();
    println!("  ── Clinical Summary ──────────────────────────");
    if summary.is_fallback() {
        println!("  Summary unavailable. The session needs human review.");
        return;
    }
    let field = |label: &str, value: &str| {
        if !value.is_empty() {
            println!("  {label:<17}{value}");
        }
    };
    field("Patient", &summary.patient_name);
    field("Age / Gender", &format!("{} {}", summary.age, summary.gender).trim().to_string());
    field("Visit Type", &summary.visit_type);
    field("Chief Complaint", &summary.chief_complaint);
    field("HPI", &summary.hpi);
    field("Risk Level", &summary.risk_level);
    field("Follow-up", if summary.follow_up_required { "YES" } else { "No" });
    if !summary.medication_plan.is_empty() {
        field("Rx Plan", &summary.medication_plan.join(", "));
    }
    if let Ok(json) = serde_json::to_string(&summary.vitals) {
        field("Vitals", &json);
    }
}
