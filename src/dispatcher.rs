use crate::command::{Command, CommandKind};
use crate::error::CommandError;
use crate::fact_dispenser::{load_facts, FactDispenser, FactOutcome};
use crate::history_log::HistoryLog;
use crate::middleware::{Admission, Chain, Verdict};
use crate::registry::{self, Registry};
use crate::response::{self, texts};
use crate::transport::{ChatTransport, InboundMessage, ReplySender};
use anyhow::Result;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Board state shared between the dispatcher and the midnight task.
#[derive(Debug, Default)]
pub struct BotState {
    pub registry: Registry,
    pub facts: FactDispenser,
}

pub type SharedState = Arc<Mutex<BotState>>;

/// Routes inbound chat commands through the admission chain to their handlers.
///
/// `serve` runs a single worker over the inbound stream. Handlers still hold
/// the state lock while reading or mutating the board, since the midnight task
/// shares it. History writes and fact file reads happen outside it.
pub struct Dispatcher {
    state: SharedState,
    chain: Chain,
    history: HistoryLog,
    fact_file: PathBuf,
    bot_username: Option<String>,
}

impl Dispatcher {
    /// Pause before polling again after a transport error.
    const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

    pub fn new(state: SharedState, chain: Chain, history: HistoryLog, fact_file: PathBuf) -> Self {
        Self {
            state,
            chain,
            history,
            fact_file,
            bot_username: None,
        }
    }

    /// Only accept `/cmd@name` when `name` is this bot.
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Handle one inbound message. `None` means no reply is sent.
    pub fn handle(&self, msg: &InboundMessage) -> Option<String> {
        self.handle_at(msg, Instant::now(), registry::today())
    }

    pub fn handle_at(&self, msg: &InboundMessage, now: Instant, today: NaiveDate) -> Option<String> {
        let command = Command::parse(&msg.text, self.bot_username.as_deref())?;
        let admission = Admission {
            chat_id: msg.chat_id,
            command: &command,
            now,
        };

        match self.chain.run(&admission) {
            Verdict::Continue => {}
            Verdict::Drop(_) => return None,
            Verdict::Reject(e) => {
                log::info!("Rejected /{} from chat {}: {}", command.kind.name(), msg.chat_id, e);
                return Some(rejection_reply(&e).to_string());
            }
        }

        log::info!("Handling /{} from chat {}", command.kind.name(), msg.chat_id);
        match self.execute(&command, today) {
            Ok(reply) => Some(reply),
            Err(e) => {
                log::error!("/{} failed: {:#}", command.kind.name(), e);
                Some(texts::INTERNAL_ERROR.to_string())
            }
        }
    }

    fn execute(&self, command: &Command, today: NaiveDate) -> Result<String> {
        match command.kind {
            CommandKind::Start => Ok(texts::HELP.to_string()),
            CommandKind::Add => Ok(self.handle_add(command, today)),
            CommandKind::Del => Ok(self.handle_del(command, today)),
            CommandKind::List => Ok(self.handle_list(today)),
            CommandKind::DelAll => Ok(self.handle_del_all(today)),
            CommandKind::Fact => self.handle_fact(today),
        }
    }

    fn handle_add(&self, command: &Command, today: NaiveDate) -> String {
        if command.args.is_empty() {
            return texts::ADD_USAGE.to_string();
        }
        let added = self.state.lock().registry.add_on(&command.raw_args(), today);
        if added.is_empty() {
            return texts::ADD_USAGE.to_string();
        }

        log::info!("Added {:?} at positions {:?}", added.labels, added.positions);
        self.history.record(today, &added.labels);
        response::added(&added.labels, today)
    }

    fn handle_del(&self, command: &Command, today: NaiveDate) -> String {
        let result = parse_position(command.args.first().map(String::as_str))
            .and_then(|position| {
                self.state
                    .lock()
                    .registry
                    .delete_on(position, today)
                    .map(|label| (position, label))
            });

        match result {
            Ok((position, label)) => {
                log::info!("Removed #{}: {}", position, label);
                response::removed(position, &label)
            }
            Err(e) => {
                log::info!("/del refused: {}", e);
                del_error_reply(command, &e).to_string()
            }
        }
    }

    fn handle_list(&self, today: NaiveDate) -> String {
        let entries = self.state.lock().registry.list_on(today);
        response::list(&entries, today)
    }

    fn handle_del_all(&self, today: NaiveDate) -> String {
        let removed = self.state.lock().registry.clear_on(today);
        if removed > 0 {
            log::info!("Cleared {} entries", removed);
            texts::ALL_CLEARED.to_string()
        } else {
            texts::NOTHING_TO_CLEAR.to_string()
        }
    }

    fn handle_fact(&self, today: NaiveDate) -> Result<String> {
        if self.state.lock().facts.is_served() {
            return Ok(texts::FACT_ALREADY_SERVED.to_string());
        }
        let facts = load_facts(&self.fact_file)?;
        let outcome = self.state.lock().facts.serve(&facts, &mut rand::thread_rng());
        Ok(match outcome {
            FactOutcome::Served(fact) => response::fact(&fact, today),
            FactOutcome::AlreadyServed => texts::FACT_ALREADY_SERVED.to_string(),
            FactOutcome::NoFacts => texts::NO_FACTS.to_string(),
        })
    }

    /// Poll the transport until it is dropped. Messages are handled one at a
    /// time in arrival order.
    pub async fn serve<T: ChatTransport>(self: Arc<Self>, mut transport: T) {
        let sender = transport.split_sender();
        loop {
            let batch = match transport.next_batch().await {
                Ok(batch) => batch,
                Err(e) => {
                    log::warn!("Polling for messages failed: {:#}", e);
                    tokio::time::sleep(Self::POLL_RETRY_DELAY).await;
                    continue;
                }
            };
            for msg in batch {
                Arc::clone(&self).process(msg, sender.clone()).await;
            }
        }
    }

    /// Handle one message on a blocking thread and send the reply, if any.
    pub async fn process<S: ReplySender>(self: Arc<Self>, msg: InboundMessage, sender: S) {
        let chat_id = msg.chat_id;
        let reply = match tokio::task::spawn_blocking(move || self.handle(&msg)).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Command handler for chat {} crashed: {}", chat_id, e);
                Some(texts::INTERNAL_ERROR.to_string())
            }
        };

        if let Some(text) = reply {
            if let Err(e) = sender.send(chat_id, &text).await {
                log::warn!("Failed to send reply to chat {}: {:#}", chat_id, e);
            }
        }
    }
}

/// Parse a 1-based position argument. Only plain digits are accepted.
fn parse_position(arg: Option<&str>) -> Result<usize, CommandError> {
    let arg = arg.ok_or_else(|| CommandError::InvalidInput("missing position".into()))?;
    if arg.is_empty() || !arg.chars().all(|c| c.is_ascii_digit()) {
        return Err(CommandError::InvalidInput(format!("'{}' is not a number", arg)));
    }
    arg.parse::<usize>()
        .map_err(|_| CommandError::InvalidInput(format!("'{}' is too large", arg)))
}

fn rejection_reply(e: &CommandError) -> &'static str {
    match e {
        CommandError::NotPermitted(_) => texts::NOT_PERMITTED,
        _ => texts::INTERNAL_ERROR,
    }
}

fn del_error_reply(command: &Command, e: &CommandError) -> &'static str {
    let looks_numeric = command
        .args
        .first()
        .is_some_and(|a| !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()));
    match e {
        CommandError::OutOfRange { .. } => texts::DEL_OUT_OF_RANGE,
        CommandError::InvalidInput(_) if looks_numeric => texts::DEL_INVALID_NUMBER,
        _ => texts::DEL_USAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allow_list::AllowList;
    use crate::flood_gate::FloodGate;
    use crate::middleware::{AllowListStage, FloodStage};
    use tempfile::{tempdir, TempDir};

    const GROUP: i64 = -1002468965180;
    const STRANGER: i64 = 1234;

    struct Fixture {
        _tmp: TempDir,
        dispatcher: Dispatcher,
        state: SharedState,
        history_path: PathBuf,
        fact_path: PathBuf,
    }

    fn fixture(flood_limit: u32) -> Fixture {
        let tmp = tempdir().unwrap();
        let history_path = tmp.path().join("history.txt");
        let fact_path = tmp.path().join("faktat.txt");
        let state = SharedState::default();
        let chain = Chain::new()
            .with(FloodStage::new(Arc::new(Mutex::new(FloodGate::new(flood_limit, 60)))))
            .with(AllowListStage::new(AllowList::new([GROUP])));
        let dispatcher = Dispatcher::new(
            Arc::clone(&state),
            chain,
            HistoryLog::new(&history_path),
            fact_path.clone(),
        )
        .with_bot_username(Some("PatonkiBot".into()));
        Fixture {
            _tmp: tmp,
            dispatcher,
            state,
            history_path,
            fact_path,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn send(f: &Fixture, chat_id: i64, text: &str, today: NaiveDate) -> Option<String> {
        let msg = InboundMessage {
            chat_id,
            text: text.into(),
        };
        f.dispatcher.handle_at(&msg, Instant::now(), today)
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position(Some("3")), Ok(3));
        assert_eq!(parse_position(Some("0")), Ok(0));
        assert!(parse_position(None).is_err());
        assert!(parse_position(Some("-1")).is_err());
        assert!(parse_position(Some("+1")).is_err());
        assert!(parse_position(Some("kaksi")).is_err());
        assert!(parse_position(Some("99999999999999999999999")).is_err());
    }

    #[test]
    fn test_add_list_and_rollover() {
        let f = fixture(100);
        assert_eq!(
            send(&f, GROUP, "/add Suklaa, Vanilja", day(1)).unwrap(),
            "Lisättiin patongit: Suklaa, Vanilja (01.01.2024)"
        );
        assert_eq!(
            send(&f, GROUP, "/list", day(1)).unwrap(),
            "Patongit (01.01.2024):\n1. Suklaa\n2. Vanilja"
        );
        assert_eq!(
            send(&f, GROUP, "/list", day(2)).unwrap(),
            "Patongit (02.01.2024): Ei patonkeja :("
        );
    }

    #[test]
    fn test_add_writes_history() {
        let f = fixture(100);
        send(&f, GROUP, "/add Suklaa, Vanilja", day(1));
        let history = std::fs::read_to_string(&f.history_path).unwrap();
        assert_eq!(history, "01.01.2024: Suklaa\n01.01.2024: Vanilja\n");
    }

    #[test]
    fn test_add_without_labels_gives_usage() {
        let f = fixture(100);
        assert_eq!(send(&f, GROUP, "/add", day(1)).unwrap(), texts::ADD_USAGE);
        assert_eq!(send(&f, GROUP, "/add , ,", day(1)).unwrap(), texts::ADD_USAGE);
        assert!(f.state.lock().registry.list_on(day(1)).is_empty());
        assert!(!f.history_path.exists());
    }

    #[test]
    fn test_del_replies() {
        let f = fixture(100);
        send(&f, GROUP, "/add a, b, c", day(1));

        assert_eq!(send(&f, GROUP, "/del 2", day(1)).unwrap(), "Poistettiin patonki #2: b");
        assert_eq!(
            send(&f, GROUP, "/list", day(1)).unwrap(),
            "Patongit (01.01.2024):\n1. a\n2. c"
        );
        assert_eq!(send(&f, GROUP, "/del", day(1)).unwrap(), texts::DEL_USAGE);
        assert_eq!(send(&f, GROUP, "/del x", day(1)).unwrap(), texts::DEL_USAGE);
        assert_eq!(send(&f, GROUP, "/del 0", day(1)).unwrap(), texts::DEL_INVALID_NUMBER);
        assert_eq!(send(&f, GROUP, "/del 3", day(1)).unwrap(), texts::DEL_OUT_OF_RANGE);
    }

    #[test]
    fn test_del_on_empty_is_out_of_range() {
        let f = fixture(100);
        assert_eq!(send(&f, GROUP, "/del 1", day(1)).unwrap(), texts::DEL_OUT_OF_RANGE);
    }

    #[test]
    fn test_delall() {
        let f = fixture(100);
        send(&f, GROUP, "/add X", day(1));
        assert_eq!(send(&f, GROUP, "/delall", day(1)).unwrap(), texts::ALL_CLEARED);
        assert_eq!(send(&f, GROUP, "/delall", day(1)).unwrap(), texts::NOTHING_TO_CLEAR);
    }

    #[test]
    fn test_delall_with_only_stale_entries() {
        let f = fixture(100);
        send(&f, GROUP, "/add X", day(1));
        assert_eq!(send(&f, GROUP, "/delall", day(2)).unwrap(), texts::NOTHING_TO_CLEAR);
    }

    #[test]
    fn test_stranger_cannot_mutate() {
        let f = fixture(100);
        send(&f, GROUP, "/add a", day(1));

        for text in ["/add b", "/del 1", "/delall", "/start"] {
            assert_eq!(send(&f, STRANGER, text, day(1)).unwrap(), texts::NOT_PERMITTED);
        }
        assert_eq!(
            f.state.lock().registry.list_on(day(1)),
            vec![(1, "a".to_string())]
        );
        // Reading is open to everyone.
        assert!(send(&f, STRANGER, "/list", day(1)).unwrap().contains("1. a"));
    }

    #[test]
    fn test_flood_drops_silently() {
        let f = fixture(3);
        assert!(send(&f, GROUP, "/list", day(1)).is_some());
        assert!(send(&f, GROUP, "/list", day(1)).is_some());
        assert!(send(&f, GROUP, "/add a", day(1)).is_none());
        assert!(send(&f, GROUP, "/start", day(1)).is_none());
        assert!(f.state.lock().registry.list_on(day(1)).is_empty());
    }

    #[test]
    fn test_ignored_messages_do_not_count() {
        let f = fixture(2);
        for _ in 0..5 {
            assert!(send(&f, GROUP, "moi kaikki", day(1)).is_none());
            assert!(send(&f, GROUP, "/unknown", day(1)).is_none());
            assert!(send(&f, GROUP, "/list@OtherBot", day(1)).is_none());
        }
        assert!(send(&f, GROUP, "/list@PatonkiBot", day(1)).is_some());
    }

    #[test]
    fn test_start_shows_help() {
        let f = fixture(100);
        assert_eq!(send(&f, GROUP, "/start", day(1)).unwrap(), texts::HELP);
    }

    #[test]
    fn test_fact_once_per_day() {
        let f = fixture(100);
        std::fs::write(&f.fact_path, "Patonki on pitkä.\n").unwrap();

        assert_eq!(
            send(&f, STRANGER, "/fact", day(1)).unwrap(),
            "Päivän fakta (01.01.2024)🥖😱:\nPatonki on pitkä."
        );
        assert_eq!(send(&f, GROUP, "/fact", day(1)).unwrap(), texts::FACT_ALREADY_SERVED);

        f.state.lock().facts.reset();
        assert!(send(&f, GROUP, "/fact", day(2)).unwrap().contains("Patonki on pitkä."));
    }

    #[test]
    fn test_fact_without_file() {
        let f = fixture(100);
        assert_eq!(send(&f, GROUP, "/fact", day(1)).unwrap(), texts::NO_FACTS);
    }

    #[test]
    fn test_fact_read_failure_apologises() {
        let f = fixture(100);
        // A directory where the file should be cannot be read.
        std::fs::create_dir(&f.fact_path).unwrap();
        assert_eq!(send(&f, GROUP, "/fact", day(1)).unwrap(), texts::INTERNAL_ERROR);
    }

    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<(i64, String)>>>,
    }

    impl ReplySender for RecordingSender {
        async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
            self.sent.lock().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_process_sends_reply() {
        let f = fixture(100);
        let dispatcher = Arc::new(f.dispatcher);
        let sender = RecordingSender::default();

        let msg = InboundMessage {
            chat_id: GROUP,
            text: "/start".into(),
        };
        Arc::clone(&dispatcher).process(msg, sender.clone()).await;

        let sent = sender.sent.lock().clone();
        assert_eq!(sent, vec![(GROUP, texts::HELP.to_string())]);
    }

    #[tokio::test]
    async fn test_process_silent_drop_sends_nothing() {
        let f = fixture(1);
        let dispatcher = Arc::new(f.dispatcher);
        let sender = RecordingSender::default();

        let msg = InboundMessage {
            chat_id: GROUP,
            text: "/list".into(),
        };
        Arc::clone(&dispatcher).process(msg, sender.clone()).await;
        assert!(sender.sent.lock().is_empty());
    }

    /// Hands out prepared batches, then waits forever.
    struct ScriptedTransport {
        batches: Vec<Vec<InboundMessage>>,
        sender: RecordingSender,
    }

    impl ChatTransport for ScriptedTransport {
        type Sender = RecordingSender;

        async fn next_batch(&mut self) -> Result<Vec<InboundMessage>> {
            if self.batches.is_empty() {
                std::future::pending::<()>().await;
            }
            Ok(self.batches.remove(0))
        }

        fn split_sender(&self) -> RecordingSender {
            self.sender.clone()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_serve_replies_in_arrival_order() {
        let f = fixture(100);
        let dispatcher = Arc::new(f.dispatcher);
        let sender = RecordingSender::default();
        let batch = ["/add a", "/del 1", "/list"]
            .iter()
            .map(|text| InboundMessage {
                chat_id: GROUP,
                text: text.to_string(),
            })
            .collect();
        let transport = ScriptedTransport {
            batches: vec![batch],
            sender: sender.clone(),
        };

        let task = tokio::spawn(Arc::clone(&dispatcher).serve(transport));
        let waited = tokio::time::timeout(Duration::from_secs(10), async {
            while sender.sent.lock().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        task.abort();
        assert!(waited.is_ok(), "replies were not sent in time");

        let sent: Vec<String> = sender.sent.lock().iter().map(|(_, t)| t.clone()).collect();
        assert!(sent[0].starts_with("Lisättiin patongit: a ("), "got {:?}", sent);
        assert_eq!(sent[1], "Poistettiin patonki #1: a");
        assert!(sent[2].ends_with("Ei patonkeja :("), "got {:?}", sent);
    }

    #[test]
    fn test_concurrent_add_and_del_stay_consistent() {
        use std::collections::HashSet;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let f = fixture(u32::MAX);
        let added = AtomicUsize::new(0);
        let removed = AtomicUsize::new(0);
        let removed_labels = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for t in 0..8 {
                let (f, added, removed, removed_labels) = (&f, &added, &removed, &removed_labels);
                scope.spawn(move || {
                    for i in 0..50 {
                        let text = if i % 3 == 2 {
                            "/del 1".to_string()
                        } else {
                            format!("/add t{}-{}", t, i)
                        };
                        let reply = send(f, GROUP, &text, day(1)).unwrap();
                        if reply.starts_with("Lisättiin") {
                            added.fetch_add(1, Ordering::SeqCst);
                        } else if let Some(label) = reply.strip_prefix("Poistettiin patonki #1: ") {
                            removed.fetch_add(1, Ordering::SeqCst);
                            removed_labels.lock().push(label.to_string());
                        } else {
                            assert_eq!(reply, texts::DEL_OUT_OF_RANGE);
                        }
                    }
                });
            }
        });

        let list = f.state.lock().registry.list_on(day(1));
        let added = added.load(Ordering::SeqCst);
        let removed = removed.load(Ordering::SeqCst);
        assert_eq!(added, 8 * 34);
        assert_eq!(list.len(), added - removed);

        let positions: Vec<usize> = list.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, (1..=list.len()).collect::<Vec<_>>());

        // Every label is unique, so nothing may be both removed and listed,
        // and nothing may be removed twice.
        let removed_labels = removed_labels.into_inner();
        let removed_set: HashSet<&String> = removed_labels.iter().collect();
        assert_eq!(removed_set.len(), removed_labels.len());
        assert!(list.iter().all(|(_, label)| !removed_set.contains(label)));
    }
}
