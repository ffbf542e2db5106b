use utilities::{
    logger::{instrument, trace, tracing, warn},
    message::{MasterRequest, MasterResponse, PrimaryLocation},
};

use crate::{
    master_state::MasterState,
    selection_policy::{
        least_loaded_policy::LeastLoadedPolicy, selection_policy::ChunkServerSelectionPolicy,
    },
};

pub struct ClientHandler {
    selector: Box<dyn ChunkServerSelectionPolicy + Send + Sync>,
}

impl ClientHandler {
    pub fn new(state: MasterState) -> Self {
        Self {
            selector: Box::new(LeastLoadedPolicy::new(state)),
        }
    }
    #[instrument(name = "master_handle_request", skip(self), fields(file_name = %request.file_name()))]
    pub async fn handle_request(&self, request: MasterRequest) -> MasterResponse {
        let response = match &request {
            MasterRequest::Read { file_name } => self
                .selector
                .select_for_read(file_name)
                .await
                .map(|server| MasterResponse::Address(server.address())),
            MasterRequest::Write { file_name } => self
                .selector
                .select_for_write(file_name)
                .await
                .map(|server| {
                    MasterResponse::Primary(PrimaryLocation {
                        address: server.host,
                        port: server.port,
                    })
                }),
        };
        match response {
            Ok(response) => {
                trace!(?response, "lookup answered");
                response
            }
            Err(e) => {
                warn!(error = %e, "lookup failed");
                MasterResponse::Error(e)
            }
        }
    }
}
