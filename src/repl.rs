use crate::agent::ChatAgent;
use crate::history::clamp_limit;
use crate::models::chat::ConversationId;
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt };

const HELP: &str = "Commands: /new, /history [conversation_id], /search <query> [limit], /quit\n";

enum Command<'a> {
    New,
    History(Option<&'a str>),
    Search(String, Option<i64>),
    Help,
    Quit,
    Chat,
}

fn parse_command(line: &str) -> Command<'_> {
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Chat;
    };
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match name {
        "new" => Command::New,
        "history" => Command::History(arg),
        "search" => {
            let arg = arg.unwrap_or_default();
            // A trailing integer is the limit, unless it is the whole query.
            match arg.rsplit_once(char::is_whitespace) {
                Some((query, last)) if last.parse::<i64>().is_ok() => {
                    Command::Search(query.trim().to_string(), last.parse().ok())
                }
                _ => Command::Search(arg.to_string(), None),
            }
        }
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        _ => Command::Chat,
    }
}

/// Line-oriented chat loop. Returns when input ends or `/quit` is read.
pub async fn run_repl<R, W>(
    agent: Arc<ChatAgent>,
    input: R,
    mut output: W,
    default_limit: usize
) -> std::io::Result<()>
    where R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin
{
    let mut session = Session::new();
    let id = agent.start_new_conversation(&mut session).await;
    output.write_all(format!("Conversation {} started. {}", id, HELP).as_bytes()).await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut out = String::new();
        match parse_command(trimmed) {
            Command::Quit => {
                break;
            }
            Command::Help => out.push_str(HELP),
            Command::New => {
                let id = agent.start_new_conversation(&mut session).await;
                out.push_str(&format!("Conversation {} started.\n", id));
            }
            Command::History(id) => {
                let id = id.map(ConversationId::from);
                let messages = agent.history(&session, id.as_ref()).await;
                out.push_str("Conversation History:\n");
                if messages.is_empty() {
                    out.push_str("(no messages)\n");
                }
                for message in messages {
                    out.push_str(&format!("{}: {}\n", message.role, message.content));
                }
            }
            Command::Search(query, limit) => {
                let hits = agent.search(&query, clamp_limit(limit, default_limit)).await;
                out.push_str(&format!("Search Results for '{}':\n", query));
                for hit in hits {
                    out.push_str(
                        &format!("Conversation {}: {}\n", hit.conversation_id, hit.message.content)
                    );
                }
            }
            Command::Chat => {
                let reply = agent.send(&mut session, &line).await;
                out.push_str(&format!("Assistant: {}\n", reply.content));
            }
        }
        output.write_all(out.as_bytes()).await?;
    }

    output.flush().await?;
    info!("Interactive session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::agent_with;
    use crate::llm::chat::CompletionError;

    async fn run_script(script: &str, agent: ChatAgent) -> String {
        let mut output = Vec::new();
        run_repl(Arc::new(agent), script.as_bytes(), &mut output, 5).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn chat_history_and_search_round() {
        let (agent, _) = agent_with(vec![Ok("Quantum computers use qubits.".into())]);
        let out = run_script(
            "Hello! Can you help me understand quantum computing?\n/history\n/search quantum\n/quit\nignored\n",
            agent
        ).await;

        assert!(out.contains("Assistant: Quantum computers use qubits.\n"));
        assert!(out.contains("user: Hello! Can you help me understand quantum computing?\n"));
        assert!(out.contains("assistant: Quantum computers use qubits.\n"));
        assert!(out.contains("Search Results for 'quantum':\n"));
        assert_eq!(out.matches("Conversation ").count(), 4);
        assert!(!out.contains("ignored"));
    }

    #[tokio::test]
    async fn new_conversation_has_empty_history() {
        let (agent, _) = agent_with(vec![]);
        let out = run_script("hi\n/new\n/history\n", agent).await;
        assert!(out.contains("(no messages)"));
    }

    #[tokio::test]
    async fn failures_print_error_text() {
        let (agent, _) = agent_with(vec![Err(CompletionError::Capability("quota exceeded".into()))]);
        let out = run_script("x\n", agent).await;
        assert!(out.contains("Assistant: Error: provider refused request: quota exceeded\n"));
    }

    #[tokio::test]
    async fn chat_lines_are_sent_untrimmed() {
        let (agent, client) = agent_with(vec![Ok("ok".into())]);
        let agent = Arc::new(agent);
        let mut output = Vec::new();
        run_repl(agent.clone(), "   indented code\t\n".as_bytes(), &mut output, 5).await.unwrap();

        assert_eq!(*client.prompts.lock().await, vec!["   indented code\t"]);
        let hits = agent.search("indented", 5).await;
        assert_eq!(hits[0].message.content, "   indented code\t");
    }

    #[test]
    fn search_limit_is_taken_from_trailing_integer() {
        match parse_command("/search big cats 2") {
            Command::Search(q, limit) => {
                assert_eq!(q, "big cats");
                assert_eq!(limit, Some(2));
            }
            _ => panic!("expected search"),
        }
        match parse_command("/search 2024") {
            Command::Search(q, limit) => {
                assert_eq!(q, "2024");
                assert_eq!(limit, None);
            }
            _ => panic!("expected search"),
        }
        assert!(matches!(parse_command("/unknown thing"), Command::Chat));
    }
}
