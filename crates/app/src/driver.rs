//! Line-oriented commands for driving an `ExamSession` from a terminal.

use std::fmt::Write as _;

use exam_core::model::{
    ExamView, LearnerId, ModuleId, OptionLetter, QuestionKind, format_clock,
};
use services::{DeliveryStatus, ExamSession, SessionError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    Next,
    Back,
    Jump(usize),
    Choose(OptionLetter),
    Answer(String),
    CrossOut(OptionLetter),
    UndoCrossOut(OptionLetter),
    ToggleCrossOutTool,
    Mark,
    Review,
    Advance,
    Status,
    Retry,
    Start,
    Reset,
    Help,
    Quit,
}

impl DriverCommand {
    /// Parse one input line.
    ///
    /// # Errors
    ///
    /// Returns a message for unknown commands or bad arguments.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(head, rest)| (head, rest.trim()));

        let letter =
            |rest: &str| rest.parse::<OptionLetter>().map_err(|err| err.to_string());

        match head {
            "n" | "next" => Ok(Self::Next),
            "b" | "back" => Ok(Self::Back),
            "j" | "jump" => rest
                .parse::<usize>()
                .map(Self::Jump)
                .map_err(|_| format!("expected a question number, got {rest:?}")),
            "c" | "choose" => letter(rest).map(Self::Choose),
            "a" | "answer" => Ok(Self::Answer(rest.to_string())),
            "x" => letter(rest).map(Self::CrossOut),
            "u" => letter(rest).map(Self::UndoCrossOut),
            "t" => Ok(Self::ToggleCrossOutTool),
            "m" | "mark" => Ok(Self::Mark),
            "r" | "review" => Ok(Self::Review),
            "go" => Ok(Self::Advance),
            "s" | "status" => Ok(Self::Status),
            "retry" => Ok(Self::Retry),
            "start" => Ok(Self::Start),
            "reset" => Ok(Self::Reset),
            "h" | "help" | "?" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

pub const HELP: &str = "\
commands:
  n / b          next / previous question
  j N            jump to question N (also from the review page)
  c X            choose option X
  a TEXT         enter a free response
  x X / u X      cross out / restore option X
  t              toggle the cross-out tool
  m              mark for review
  r              open the review page
  go             leave the review page (next module or submit)
  retry          resume a failed module load, or resend a failed submission
  start / reset  restart the flow / return home
  s              show status
  q              quit";

/// Apply one command. Returns `false` when the driver should stop.
///
/// # Errors
///
/// Returns `SessionError` from the session; the caller prints it and continues.
pub async fn apply(
    session: &mut ExamSession,
    command: DriverCommand,
    learner: &LearnerId,
    flow: &[ModuleId],
) -> Result<bool, SessionError> {
    match command {
        DriverCommand::Next => {
            session.next()?;
        }
        DriverCommand::Back => {
            session.back()?;
        }
        DriverCommand::Jump(position) => {
            session.jump_to(position)?;
        }
        DriverCommand::Choose(letter) => session.select_choice(letter)?,
        DriverCommand::Answer(text) => session.enter_free_response(text)?,
        DriverCommand::CrossOut(letter) => {
            session.toggle_cross_out(letter)?;
        }
        DriverCommand::UndoCrossOut(letter) => {
            session.undo_cross_out(letter)?;
        }
        DriverCommand::ToggleCrossOutTool => {
            session.toggle_cross_out_tool()?;
        }
        DriverCommand::Mark => {
            session.toggle_mark()?;
        }
        DriverCommand::Review => {
            session.open_review()?;
        }
        DriverCommand::Advance => {
            session.advance_module().await?;
        }
        DriverCommand::Retry => match session.view() {
            ExamView::Finished => session.retry_delivery().await?,
            _ => {
                session.resume().await?;
            }
        },
        DriverCommand::Start => {
            session.start(learner.clone(), flow.to_vec()).await?;
        }
        DriverCommand::Reset => session.reset(),
        DriverCommand::Status | DriverCommand::Help => {}
        DriverCommand::Quit => return Ok(false),
    }
    Ok(true)
}

/// Text rendering of the session for the terminal.
#[must_use]
pub fn render(session: &ExamSession) -> String {
    let mut out = String::new();
    let view = session.view();
    let _ = write!(out, "[{view}]");
    if let Some(remaining) = session.remaining_time() {
        let _ = write!(out, " time left {}", format_clock(remaining));
    }
    out.push('\n');

    match view {
        ExamView::Home => {
            if let Some(err) = session.last_error() {
                let _ = writeln!(out, "last attempt failed: {err} (type 'retry' or 'start')");
            } else {
                let _ = writeln!(out, "type 'start' to begin");
            }
        }
        ExamView::InModule => render_question(session, &mut out),
        ExamView::ReviewPage => render_review(session, &mut out),
        ExamView::ModuleTransition => {
            let _ = writeln!(out, "loading next module...");
        }
        ExamView::Finished => {
            let records = session.submission().map_or(0, <[_]>::len);
            let status = match session.delivery_status() {
                DeliveryStatus::NotAttempted => "not sent".to_string(),
                DeliveryStatus::Delivered => "delivered".to_string(),
                DeliveryStatus::Failed(err) => format!("failed: {err} (type 'retry')"),
            };
            let _ = writeln!(out, "submitted {records} answers, {status}");
        }
    }
    out
}

fn render_question(session: &ExamSession, out: &mut String) {
    if let (Some(module), Some(progress)) = (session.current_module(), session.progress()) {
        let _ = writeln!(
            out,
            "{} ({}/{}) question {} of {}",
            module.display_name(),
            progress.module_number,
            progress.module_count,
            progress.question_number,
            progress.question_count
        );
    }
    let Some(question) = session.current_question() else {
        return;
    };
    let answer = session.current_answer();
    let marked = answer.is_some_and(|state| state.is_marked());
    let _ = writeln!(out, "{}{}", if marked { "[marked] " } else { "" }, question.prompt());

    match question.kind() {
        QuestionKind::MultipleChoice { options } => {
            for option in options {
                let selected = answer.and_then(|state| state.selected_choice()) == Some(option.letter);
                let crossed = answer.is_some_and(|state| state.is_crossed_out(option.letter));
                let _ = writeln!(
                    out,
                    " {} {}) {}{}",
                    if selected { '*' } else { ' ' },
                    option.letter,
                    option.text,
                    if crossed { "  (crossed out)" } else { "" }
                );
            }
            if session.cross_out_tool_active() {
                let _ = writeln!(out, "cross-out tool on");
            }
        }
        QuestionKind::FreeResponse => {
            let typed = answer.and_then(|state| state.spr_answer()).unwrap_or("");
            let _ = writeln!(out, " answer: {typed}");
        }
    }
}

fn render_review(session: &ExamSession, out: &mut String) {
    if let Some(progress) = session.progress() {
        let _ = writeln!(
            out,
            "answered {} / unanswered {} / marked {}",
            progress.answered,
            progress.unanswered(),
            progress.marked
        );
    }
    let cells: Vec<String> = session
        .navigator()
        .iter()
        .map(|entry| {
            let state = match (entry.answered, entry.marked) {
                (_, true) => "?",
                (true, false) => "x",
                (false, false) => ".",
            };
            format!("{}{state}", entry.position)
        })
        .collect();
    let _ = writeln!(out, "{}", cells.join(" "));
    let _ = writeln!(out, "type 'j N' to revisit a question or 'go' to continue");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(DriverCommand::parse("n"), Ok(DriverCommand::Next));
        assert_eq!(DriverCommand::parse(" j 12 "), Ok(DriverCommand::Jump(12)));
        assert_eq!(
            DriverCommand::parse("c b"),
            Ok(DriverCommand::Choose(OptionLetter::B))
        );
        assert_eq!(
            DriverCommand::parse("a  7/2 "),
            Ok(DriverCommand::Answer("7/2".into()))
        );
        assert_eq!(
            DriverCommand::parse("x E"),
            Ok(DriverCommand::CrossOut(OptionLetter::E))
        );
        assert_eq!(DriverCommand::parse("go"), Ok(DriverCommand::Advance));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(DriverCommand::parse("").is_err());
        assert!(DriverCommand::parse("j two").is_err());
        assert!(DriverCommand::parse("c F").is_err());
        assert!(DriverCommand::parse("c AB").is_err());
        assert!(DriverCommand::parse("dance").is_err());
    }
}
