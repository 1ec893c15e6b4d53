//! Interactive session helpers for `scriptpilot chat` and `scriptpilot ask`.
//!
//! Search augmentation lives here rather than in the controller: the loop
//! only ever sees the already-merged prompt text.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::controller::{AgentController, TurnEvent};
use crate::core::gate::Confirmer;
use crate::core::types::TurnOutcome;
use crate::io::console::Console;
use crate::io::provider::ModelProvider;
use crate::io::sandbox::ScriptRunner;
use crate::io::search::{SearchProvider, augment_prompt};

const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", ":q"];

/// Merge search results into `input` when a search provider is configured.
pub fn prepare_input<S: SearchProvider + ?Sized>(
    input: &str,
    search: Option<&S>,
    cancel: &CancelToken,
) -> Result<String> {
    let Some(search) = search else {
        return Ok(input.to_string());
    };
    let results = search.search(input, cancel).context("web search")?;
    debug!(results = results.len(), "search results merged into prompt");
    Ok(augment_prompt(input, &results))
}

/// Run one user input through search augmentation and the controller,
/// printing progress and the outcome to `display`.
pub fn run_single<P, R, S, C, W>(
    controller: &mut AgentController<P, R>,
    input: &str,
    search: Option<&S>,
    confirmer: &mut C,
    display: &mut W,
) -> Result<TurnOutcome>
where
    P: ModelProvider,
    R: ScriptRunner,
    S: SearchProvider + ?Sized,
    C: Confirmer + ?Sized,
    W: Write,
{
    // A Ctrl-C at the idle prompt must not cancel the next search.
    controller.cancel_token().reset();
    let prompt = prepare_input(input, search, controller.cancel_token())?;

    let mut write_error: Option<io::Error> = None;
    let outcome = controller.run_turn(&prompt, confirmer, |event| {
        if write_error.is_none()
            && let Err(e) = render_event(display, event)
        {
            write_error = Some(e);
        }
    })?;
    if let Some(e) = write_error {
        return Err(e).context("write to display");
    }
    render_outcome(display, &outcome).context("write to display")?;
    info!(outcome = outcome.label(), "turn finished");
    Ok(outcome)
}

/// Read-eval loop until EOF or an exit command.
///
/// Search failures and internal errors are printed and the loop continues
/// with the next input.
pub fn run_chat<P, R, S, In, Out, W>(
    controller: &mut AgentController<P, R>,
    search: Option<&S>,
    console: &mut Console<In, Out>,
    display: &mut W,
) -> Result<()>
where
    P: ModelProvider,
    R: ScriptRunner,
    S: SearchProvider + ?Sized,
    In: BufRead,
    Out: Write,
    W: Write,
{
    loop {
        let Some(line) = console.read_input("You: ").context("read user input")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&input) {
            break;
        }
        if let Err(err) = run_single(controller, input, search, console, display) {
            writeln!(display, "error: {err:#}").context("write to display")?;
        }
    }
    Ok(())
}

fn render_event<W: Write>(display: &mut W, event: &TurnEvent<'_>) -> io::Result<()> {
    match event {
        TurnEvent::ModelReply { text } => {
            write!(display, "LLM: {text}")?;
            if text.ends_with('\n') {
                Ok(())
            } else {
                writeln!(display)
            }
        }
        TurnEvent::ScriptProposed { .. } => Ok(()),
        TurnEvent::ExecutionFinished { result } => {
            if result.succeeded() {
                Ok(())
            } else {
                writeln!(display, "(script failed: {})", result.status_line())
            }
        }
        TurnEvent::Retrying {
            attempt,
            max_retries,
        } => writeln!(
            display,
            "(sending the error back to the model, retry {attempt}/{max_retries})"
        ),
    }
}

fn render_outcome<W: Write>(display: &mut W, outcome: &TurnOutcome) -> io::Result<()> {
    match outcome {
        // Already shown as the model reply.
        TurnOutcome::Answered {
            executed: false, ..
        } => Ok(()),
        TurnOutcome::Answered {
            text,
            executed: true,
        } => {
            let text = text.trim_end();
            if text.is_empty() {
                writeln!(display, "(script executed successfully)")
            } else {
                writeln!(display, "{text}")
            }
        }
        other => writeln!(display, "[{}] {other}", other.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerSettings;
    use crate::io::search::SearchResult;
    use crate::test_support::{
        ScriptedConfirmer, ScriptedProvider, ScriptedReply, ScriptedRun, ScriptedRunner, failed,
        succeeded,
    };
    use anyhow::anyhow;
    use std::io::Cursor;

    struct FixedSearch(Result<Vec<SearchResult>, String>);

    impl SearchProvider for FixedSearch {
        fn search(&self, _query: &str, _cancel: &CancelToken) -> Result<Vec<SearchResult>> {
            self.0.clone().map_err(|e| anyhow!(e))
        }
    }

    fn controller(
        replies: Vec<ScriptedReply>,
        runs: Vec<ScriptedRun>,
    ) -> AgentController<ScriptedProvider, ScriptedRunner> {
        AgentController::new(
            ScriptedProvider::new(replies),
            ScriptedRunner::new(runs),
            &ControllerSettings {
                confirm_script: false,
                max_retries: 1,
                history_offset: 10,
                interpreter: "sh".to_string(),
            },
            CancelToken::new(),
        )
        .expect("controller")
    }

    #[test]
    fn single_turn_prints_reply_and_script_output() {
        let mut ctl = controller(
            vec![ScriptedReply::Text("```sh\necho ok\n```".to_string())],
            vec![ScriptedRun::Result(succeeded("ok\n"))],
        );
        let mut display = Vec::new();
        let outcome = run_single::<_, _, FixedSearch, _, _>(
            &mut ctl,
            "say ok",
            None,
            &mut ScriptedConfirmer::always(true),
            &mut display,
        )
        .expect("turn");
        assert!(matches!(outcome, TurnOutcome::Answered { executed: true, .. }));
        let shown = String::from_utf8(display).expect("utf8");
        assert!(shown.starts_with("LLM: ```sh"));
        assert!(shown.ends_with("ok\n"));
    }

    #[test]
    fn model_reply_is_shown_verbatim() {
        let reply = "  Indented answer.\n\n    with a code-like line  \n";
        let mut ctl = controller(vec![ScriptedReply::Text(reply.to_string())], Vec::new());
        let mut display = Vec::new();
        run_single::<_, _, FixedSearch, _, _>(
            &mut ctl,
            "explain",
            None,
            &mut ScriptedConfirmer::always(true),
            &mut display,
        )
        .expect("turn");
        assert_eq!(String::from_utf8(display).expect("utf8"), format!("LLM: {reply}"));
    }

    #[test]
    fn failure_outcome_is_labelled() {
        let mut ctl = controller(
            vec![
                ScriptedReply::Text("```sh\nexit 1\n```".to_string()),
                ScriptedReply::Text("```sh\nexit 1\n```".to_string()),
            ],
            vec![
                ScriptedRun::Result(failed(1, "bad")),
                ScriptedRun::Result(failed(1, "worse")),
            ],
        );
        let mut display = Vec::new();
        run_single::<_, _, FixedSearch, _, _>(
            &mut ctl,
            "go",
            None,
            &mut ScriptedConfirmer::always(true),
            &mut display,
        )
        .expect("turn");
        let shown = String::from_utf8(display).expect("utf8");
        assert!(shown.contains("(script failed: exit code 1)"));
        assert!(shown.contains("retry 1/1"));
        assert!(shown.contains("[retry_limit_exceeded]"));
        assert!(shown.contains("worse"));
    }

    #[test]
    fn search_results_are_merged_before_the_model_call() {
        let mut ctl = controller(vec![ScriptedReply::Text("done".to_string())], Vec::new());
        let search = FixedSearch(Ok(vec![SearchResult {
            title: "Rust".to_string(),
            url: "https://rust-lang.org".to_string(),
            text: "A language".to_string(),
        }]));
        run_single(
            &mut ctl,
            "what is rust",
            Some(&search),
            &mut ScriptedConfirmer::always(true),
            &mut Vec::<u8>::new(),
        )
        .expect("turn");
        let user = &ctl.conversation().turns()[0];
        assert!(user.content.starts_with("what is rust"));
        assert!(user.content.contains("Result 1: Rust - https://rust-lang.org"));
    }

    #[test]
    fn chat_skips_input_when_search_fails_and_stops_on_exit() {
        let mut ctl = controller(vec![ScriptedReply::Text("hello".to_string())], Vec::new());
        let search = FixedSearch(Err("search backend down".to_string()));
        let mut console = Console::new(Cursor::new("hi\n\nexit\nignored\n".as_bytes()), io::sink());
        let mut display = Vec::new();
        run_chat(&mut ctl, Some(&search), &mut console, &mut display).expect("chat");

        let shown = String::from_utf8(display).expect("utf8");
        assert!(shown.contains("error: web search: search backend down"), "{shown}");
        assert!(ctl.conversation().is_empty());
    }

    #[test]
    fn chat_runs_turns_until_eof() {
        let mut ctl = controller(
            vec![
                ScriptedReply::Text("first".to_string()),
                ScriptedReply::Text("second".to_string()),
            ],
            Vec::new(),
        );
        let mut console = Console::new(Cursor::new("one\ntwo\n".as_bytes()), io::sink());
        let mut display = Vec::new();
        run_chat::<_, _, FixedSearch, _, _, _>(&mut ctl, None, &mut console, &mut display)
            .expect("chat");
        let shown = String::from_utf8(display).expect("utf8");
        assert_eq!(shown, "LLM: first\nLLM: second\n");
        assert_eq!(ctl.conversation().len(), 4);
    }
}
