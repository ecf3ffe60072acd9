//! Event dispatch and handlers.
//!
//! Every inbound [`Event`] is handled in its own task so a slow directory
//! fetch never holds up welcome messages or other users' listings.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::aggregator::{rank, RankedDirectory};
use crate::deletion::DeletionQueue;
use crate::error::{GatewayError, SourceError};
use crate::gateway::MessagingGateway;
use crate::paginator::{paginate, NavAction, PageToken};
use crate::source::DirectorySource;
use crate::types::{ChatId, Command, Event, Member, MessageHandle};

const CONTRIBUTE_LINKS: &str = "[pagina](https://iorestoacasa.work/voglio-contribuire.html) o le \
     [issues](https://github.com/iorestoacasa-work/iorestoacasa.work/issues) presenti su GitHub";

const START_TEXT: &str =
    "Ciao! Sono il bot di supporto🤖\nConsulta il menù delle azioni per sapere cosa posso fare per te!";

const INFO_TEXT: &str = "Questo progetto è stato realizzato dall'associazione \
     [PDP Free Software User Group](https://pdp.linux.it) in collaborazione con \
     [beFair](https://befair.it).\nOltre a loro ci sono altri che hanno contribuito!\n\
     Puoi trovare la lista completa ed aggiornata [qua](https://iorestoacasa.work/crediti.html) 💪";

const SOURCE_FAILURE_TEXT: &str =
    "Non riesco a recuperare la lista dei server in questo momento 😔 Riprova più tardi.";

const RETRY_LABEL: &str = "🔄 Riprova";

pub struct Bot {
    gateway: Arc<dyn MessagingGateway>,
    source: Arc<dyn DirectorySource>,
    queue: Arc<DeletionQueue>,
    page_size: usize,
}

impl Bot {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        source: Arc<dyn DirectorySource>,
        queue: Arc<DeletionQueue>,
        page_size: usize,
    ) -> Self {
        Self {
            gateway,
            source,
            queue,
            page_size,
        }
    }

    pub async fn handle(&self, event: Event) -> Result<(), GatewayError> {
        match event {
            Event::Command { chat, command } => self.on_command(chat, command).await,
            Event::NewMembers { chat, members } => {
                self.welcome(chat, &members).await;
                Ok(())
            }
            Event::PageAction {
                action_id,
                message,
                token,
            } => self.change_page(&action_id, message, &token).await,
        }
    }

    async fn on_command(&self, chat: ChatId, command: Command) -> Result<(), GatewayError> {
        let text = match command {
            Command::Servers => return self.list_servers(chat).await,
            Command::Start => START_TEXT.to_string(),
            Command::Contribute => {
                format!("Se vuoi contribuire al progetto consulta questa {CONTRIBUTE_LINKS} 🖥")
            }
            Command::Info => INFO_TEXT.to_string(),
        };
        self.gateway.send_message(chat, &text, &[]).await?;
        Ok(())
    }

    async fn list_servers(&self, chat: ChatId) -> Result<(), GatewayError> {
        let (text, navigation) = match self.directory().await {
            Ok(directory) => {
                let page = paginate(&directory, 0, self.page_size);
                (page.render(), page.navigation())
            }
            Err(_) => (SOURCE_FAILURE_TEXT.to_string(), Vec::new()),
        };
        self.gateway.send_message(chat, &text, &navigation).await?;
        Ok(())
    }

    async fn change_page(
        &self,
        action_id: &str,
        message: MessageHandle,
        data: &str,
    ) -> Result<(), GatewayError> {
        if let Err(e) = self.gateway.answer_action(action_id).await {
            warn!("Failed to acknowledge action {}: {}", action_id, e);
        }

        let Some(token) = PageToken::decode(data) else {
            debug!("Ignoring non-navigation callback data {:?}", data);
            return Ok(());
        };

        let (text, navigation) = match self.directory().await {
            Ok(directory) => {
                let page = paginate(&directory, token.0, self.page_size);
                (page.render(), page.navigation())
            }
            Err(_) => (
                SOURCE_FAILURE_TEXT.to_string(),
                vec![NavAction {
                    label: RETRY_LABEL,
                    token,
                }],
            ),
        };
        self.gateway.edit_message(message, &text, &navigation).await
    }

    async fn welcome(&self, chat: ChatId, members: &[Member]) {
        for member in members {
            let text = welcome_text(member);
            match self.gateway.send_message(chat, &text, &[]).await {
                Ok(handle) => self.queue.enqueue(handle),
                Err(e) => warn!(
                    "Failed to welcome {} in chat {}: {}",
                    member.display_name(),
                    chat,
                    e
                ),
            }
        }
    }

    async fn directory(&self) -> Result<RankedDirectory, SourceError> {
        match self.source.fetch_instances().await {
            Ok(raw) => Ok(rank(raw)),
            Err(e) => {
                error!("Directory source {} unavailable: {}", self.source.describe(), e);
                Err(e)
            }
        }
    }
}

fn welcome_text(member: &Member) -> String {
    // Legacy Markdown has no escaping, drop anything that opens an entity.
    let name = member.display_name().replace(['*', '_', '`', '['], "");
    format!(
        "Ciao *{name}*! Benvenuto nel gruppo di supporto😁\n\
         Se vuoi contribuire al progetto consulta questa {CONTRIBUTE_LINKS}.\n\n\
         Se invece hai bisogno di aiuto scrivi pure qua, \
         qualcuno in questo gruppo sicuramente ti saprà aiutare🛠"
    )
}

/// Runs one handler task per event until shutdown or until the event
/// stream closes, then waits for the handlers still in flight.
pub async fn run_dispatcher(
    bot: Arc<Bot>,
    mut event_rx: mpsc::Receiver<Event>,
    shutdown_token: CancellationToken,
) {
    let mut handlers = JoinSet::new();
    loop {
        tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => break,
            Some(joined) = handlers.join_next() => {
                if let Err(e) = joined {
                    error!("Event handler panicked: {}", e);
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else {
                    info!("Event channel closed, shutting down dispatcher");
                    break;
                };
                let bot = Arc::clone(&bot);
                handlers.spawn(async move {
                    if let Err(e) = bot.handle(event).await {
                        error!("Failed to handle event: {}", e);
                    }
                });
            }
        }
    }

    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            error!("Event handler panicked: {}", e);
        }
    }
    debug!("Dispatcher: Exiting");
}
