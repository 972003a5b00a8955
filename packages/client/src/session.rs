//! Interactive client session: wires the terminal, the HTTP collaborator, the
//! realtime connection, and the typing timer into one event loop.

use std::sync::{Arc, Mutex};

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    api::{ChatApi, HttpChatApi},
    config::ClientConfig,
    controller::{ChatClient, HistoryStatus, check_username},
    domain::{Change, Message},
    error::ClientError,
    formatter::MessageFormatter,
    transport::{RealtimeLink, SocketIoConnection, TransportEvent},
    typing::TimerGeneration,
    ui::{InputEvent, SharedPrompt, redisplay_prompt, set_prompt, spawn_line_editor},
};

const USERNAME_PROMPT: &str = "Username: ";

/// A line typed into the compose row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to send
    Say(String),
    /// `/to [id]`
    To(String),
    /// `/who`
    Who,
    /// `/view`
    View,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// An unrecognised `/command`
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Say(line.to_string());
        };
        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        match name {
            "to" => Self::To(arg.trim().to_string()),
            "who" => Self::Who,
            "view" => Self::View,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Result of an HTTP request that ran outside the event loop
#[derive(Debug)]
enum RequestDone {
    Registered {
        username: String,
        result: Result<i64, ClientError>,
    },
    History(Result<Option<Vec<Message>>, ClientError>),
}

/// Runs HTTP requests on their own task so the event loop keeps reading
/// input, transport events, and timer fires while they are in flight.
struct Requests<A> {
    api: Arc<A>,
    done: mpsc::UnboundedSender<RequestDone>,
    in_flight: Option<JoinHandle<()>>,
}

impl<A> Requests<A>
where
    A: ChatApi + 'static,
{
    fn new(api: Arc<A>, done: mpsc::UnboundedSender<RequestDone>) -> Self {
        Self {
            api,
            done,
            in_flight: None,
        }
    }

    fn is_busy(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn register(&mut self, username: String) {
        let api = Arc::clone(&self.api);
        let done = self.done.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let result = api.register(&username).await;
            done.send(RequestDone::Registered { username, result }).ok();
        }));
    }

    fn pull_history(&mut self) {
        let api = Arc::clone(&self.api);
        let done = self.done.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let result = api.pull_history().await;
            done.send(RequestDone::History(result)).ok();
        }));
    }
}

impl<A> Drop for Requests<A> {
    fn drop(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

/// Receiving ends of every channel the event loop listens on
struct Inbox {
    input: mpsc::UnboundedReceiver<InputEvent>,
    transport: mpsc::UnboundedReceiver<TransportEvent>,
    timer: mpsc::UnboundedReceiver<TimerGeneration>,
    requests: mpsc::UnboundedReceiver<RequestDone>,
}

/// Run the interactive chat client until the user quits
pub async fn run_client(config: ClientConfig) -> Result<(), ClientError> {
    let socket_url = config.socket_url()?;

    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let link = SocketIoConnection::new(socket_url, transport_tx).websocket_only(config.websocket_only);
    let api = HttpChatApi::new(&config)?;
    let mut client = ChatClient::new(&config, api, link, timer_tx);
    let mut requests = Requests::new(client.api(), done_tx);
    let mut inbox = Inbox {
        input: input_rx,
        transport: transport_rx,
        timer: timer_rx,
        requests: done_rx,
    };

    print!("{}", MessageFormatter::format_auth_gate());
    let prompt: SharedPrompt = Arc::new(Mutex::new(USERNAME_PROMPT.to_string()));

    if let Some(username) = config.username.as_deref() {
        start_registration(&mut requests, username);
    }

    let _editor = spawn_line_editor(prompt.clone(), input_tx);

    event_loop(&mut client, &mut requests, &mut inbox, &prompt).await;

    drop(requests);
    client.teardown().await;
    println!("\nBye!");
    Ok(())
}

/// Process events one at a time until the user quits or the editor goes away
async fn event_loop<A, L>(
    client: &mut ChatClient<A, L>,
    requests: &mut Requests<A>,
    inbox: &mut Inbox,
    prompt: &SharedPrompt,
) where
    A: ChatApi + 'static,
    L: RealtimeLink,
{
    let mut view = ViewTracker::default();

    loop {
        tokio::select! {
            input = inbox.input.recv() => {
                let Some(input) = input else {
                    break;
                };
                if handle_input(client, requests, input, prompt) == Flow::Quit {
                    break;
                }
            }
            Some(event) = inbox.transport.recv() => {
                let change = client.handle_transport_event(event);
                view.render(client, change, prompt);
            }
            Some(generation) = inbox.timer.recv() => {
                let change = client.handle_timer_fire(generation);
                view.render(client, change, prompt);
            }
            Some(done) = inbox.requests.recv() => {
                handle_request_done(client, requests, done, prompt);
            }
        }
    }
}

fn handle_input<A, L>(
    client: &mut ChatClient<A, L>,
    requests: &mut Requests<A>,
    input: InputEvent,
    prompt: &SharedPrompt,
) -> Flow
where
    A: ChatApi + 'static,
    L: RealtimeLink,
{
    match input {
        InputEvent::Keystroke(buffer) => {
            client.edit_draft(&buffer);
            Flow::Continue
        }
        InputEvent::Blur => {
            client.stop_typing();
            Flow::Continue
        }
        InputEvent::Line(line) => {
            if client.state().session.is_authenticated() {
                return handle_command(client, Command::parse(&line), prompt);
            }
            if Command::parse(&line) == Command::Quit {
                return Flow::Quit;
            }
            start_registration(requests, &line);
            Flow::Continue
        }
    }
}

/// Validate `username` locally and send the registration request
fn start_registration<A>(requests: &mut Requests<A>, username: &str)
where
    A: ChatApi + 'static,
{
    if requests.is_busy() {
        print!(
            "{}",
            MessageFormatter::format_warning("Registration is already in progress")
        );
        return;
    }
    match check_username(username) {
        Ok(username) => {
            tracing::debug!("Registering '{}'", username);
            requests.register(username);
        }
        Err(e) => {
            print!("{}", MessageFormatter::format_warning(&e.to_string()));
        }
    }
}

fn handle_request_done<A, L>(
    client: &mut ChatClient<A, L>,
    requests: &mut Requests<A>,
    done: RequestDone,
    prompt: &SharedPrompt,
) where
    A: ChatApi + 'static,
    L: RealtimeLink,
{
    match done {
        RequestDone::Registered { username, result } => {
            let registered = result
                .inspect_err(|e| tracing::error!("Registration error: {}", e))
                .and_then(|user_id| client.complete_registration(&username, user_id));
            if registered.is_err() {
                print!(
                    "{}",
                    MessageFormatter::format_warning("Registration failed. Please try again.")
                );
                redisplay_prompt(prompt);
                return;
            }
            if client.loads_history() {
                requests.pull_history();
            }
            update_prompt(client, prompt);
            print!("{}", MessageFormatter::format_screen(client.state()));
            println!("Type /help for commands.");
            redisplay_prompt(prompt);
        }
        RequestDone::History(result) => match client.apply_history(result) {
            HistoryStatus::Loaded(_) => {
                print!("{}", MessageFormatter::format_screen(client.state()));
                redisplay_prompt(prompt);
            }
            HistoryStatus::Failed(reason) => {
                print!(
                    "{}",
                    MessageFormatter::format_warning(&format!(
                        "Could not load message history: {}",
                        reason
                    ))
                );
                redisplay_prompt(prompt);
            }
            HistoryStatus::Absent | HistoryStatus::Skipped => {}
        },
    }
}

fn handle_command<A, L>(
    client: &mut ChatClient<A, L>,
    command: Command,
    prompt: &SharedPrompt,
) -> Flow
where
    A: ChatApi,
    L: RealtimeLink,
{
    match command {
        Command::Say(text) => {
            let recipient_id = client.recipient_id();
            if let Err(e) = client.send_message(&text, recipient_id) {
                print!("{}", MessageFormatter::format_warning(&e.to_string()));
            }
        }
        Command::To(raw) => match client.set_recipient(&raw) {
            Ok(Some(id)) => println!("Sending direct messages to user {}", id),
            Ok(None) => println!("Broadcasting to everyone"),
            Err(e) => print!("{}", MessageFormatter::format_warning(&e.to_string())),
        },
        Command::Who => {
            let state = client.state();
            print!(
                "{}",
                MessageFormatter::format_roster(state.roster(), state.session.user_id)
            );
        }
        Command::View => print!("{}", MessageFormatter::format_screen(client.state())),
        Command::Help => print!("{}", MessageFormatter::format_help()),
        Command::Quit => return Flow::Quit,
        Command::Unknown(name) => print!(
            "{}",
            MessageFormatter::format_warning(&format!("Unknown command '/{}'", name))
        ),
    }
    update_prompt(client, prompt);
    Flow::Continue
}

fn update_prompt<A, L>(client: &ChatClient<A, L>, prompt: &SharedPrompt)
where
    A: ChatApi,
    L: RealtimeLink,
{
    let session = &client.state().session;
    set_prompt(
        prompt,
        MessageFormatter::format_prompt(&session.username, client.recipient_id()),
    );
}

/// Prints incremental output for state changes
#[derive(Default)]
struct ViewTracker {
    shown_typer: Option<i64>,
}

impl ViewTracker {
    fn render<A, L>(&mut self, client: &ChatClient<A, L>, change: Change, prompt: &SharedPrompt)
    where
        A: ChatApi,
        L: RealtimeLink,
    {
        let state = client.state();
        let output = match change {
            Change::Unchanged => return,
            Change::MessageAppended | Change::Presence => match state.messages().last() {
                Some(message) => MessageFormatter::format_message(message, state),
                None => return,
            },
            Change::RosterReplaced => {
                MessageFormatter::format_roster(state.roster(), state.session.user_id)
            }
            Change::TypingStarted => {
                let Some(indicator) = state.typing() else {
                    return;
                };
                if self.shown_typer == Some(indicator.user_id) {
                    return;
                }
                self.shown_typer = Some(indicator.user_id);
                MessageFormatter::format_typing(indicator)
            }
            Change::TypingStopped => {
                self.shown_typer = None;
                return;
            }
            Change::ConnectionChanged => MessageFormatter::format_connection(&state.session),
        };
        print!("\n{}", output);
        redisplay_prompt(prompt);
    }
}
