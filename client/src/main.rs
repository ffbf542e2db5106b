use client::{
    chunk_service::ChunkService,
    command_runner::{CommandRunner, Reply},
    config::CONFIG,
    gfs_client::GfsClient,
    master_service::MasterService,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use utilities::{
    logger::{info, init_logger},
    result::Result,
    tcp_connector::TcpConnector,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match CONFIG.as_ref() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return Err(e.clone().into());
        }
    };
    let _gaurd = init_logger("Client", &config.id, &config.log_level, &config.log_base);
    let connector = TcpConnector::new(config.connect_timeout());
    let client = GfsClient::new(
        MasterService::new(&config.master_addrs, connector, config.read_timeout()),
        ChunkService::new(connector, config.max_response_bytes, config.read_timeout()),
        config.retry_policy(),
    );
    let mut command_executer = CommandRunner::new(client, &config.output_path);
    info!(master_addrs = %config.master_addrs, "starting the Client");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = match lines.next_line().await {
            Ok(Some(input)) => input,
            Ok(None) => return Ok(()),
            Err(e) => {
                println!("error while reading the command {:?}", e);
                continue;
            }
        };
        match command_executer.handle_input(&input).await {
            Ok(Reply::Message(message)) => println!("Success : {}", message),
            Ok(Reply::Exit) => return Ok(()),
            Err(message) => println!("Error : {}", message),
        }
    }
}
