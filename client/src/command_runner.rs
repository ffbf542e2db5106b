use utilities::{logger::trace, result::Result};

use crate::gfs_client::GfsClient;

const HELP: &str = "\nread command : read remote_file_name [local_file_path]\nwrite command : write remote_file_name data...\nexit command : exit\n";

#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Message(String),
    Exit,
}

pub struct CommandRunner {
    client: GfsClient,
    output_path: String,
}

// first word and whatever follows it, with the spacing of the rest kept
fn split_first_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim_start()),
        None => (input, ""),
    }
}

impl CommandRunner {
    pub fn new(client: GfsClient, output_path: &str) -> Self {
        Self {
            client,
            output_path: output_path.to_owned(),
        }
    }
    pub async fn handle_input(&mut self, input: &str) -> Result<Reply> {
        let input = input.trim_end_matches(['\r', '\n']);
        let (command, arguments) = split_first_word(input);
        trace!(%command, "handling command");
        match command {
            "read" => {
                let inputs: Vec<&str> = arguments.split_whitespace().collect();
                if inputs.is_empty() || inputs.len() > 2 {
                    return Err("Invalid read command usage please use <help> to get help".into());
                }
                let local_path = inputs.get(1).copied().unwrap_or(&self.output_path);
                let content = self.client.read_file(inputs[0]).await?;
                tokio::fs::write(local_path, &content).await?;
                Ok(Reply::Message(format!(
                    "File {} saved to {} ({} bytes)",
                    inputs[0],
                    local_path,
                    content.len()
                )))
            }
            "write" => {
                let (file_name, data) = split_first_word(arguments);
                if file_name.is_empty() || data.is_empty() {
                    return Err("Invalid write command usage please use <help> to get help".into());
                }
                self.client.write_file(file_name, data).await?;
                Ok(Reply::Message(format!("Data written to {file_name}")))
            }
            "help" => Ok(Reply::Message(HELP.to_owned())),
            "exit" => Ok(Reply::Exit),
            _ => Err(
                "Invalid Command Please use valid command use :help to list available commands"
                    .into(),
            ),
        }
    }
}
