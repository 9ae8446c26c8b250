//! `rehearse`: terminal front end for interview rehearsal.
//!
//! # Startup sequence
//!
//! 1. Parse the command line and initialise logging.
//! 2. Load [`AppConfig`] (defaults on first run).
//! 3. Open the file store and account service.
//! 4. Run the command on a current-thread tokio runtime.  Voice commands
//!    load the Whisper model and spawn a stdin reader that turns lines into
//!    [`UserSignal`]s.

mod cli;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use interview_rehearsal::{
    account::{AccountService, CloudAccounts, CurrentUser, RemoteAccounts},
    config::{AppConfig, AppPaths},
    feedback::PerformanceLevel,
    intake::{self, fields::DEFAULT_QUESTION_COUNT, IntakeError, IntakeFields, FIELDS},
    interview::{Interview, InterviewResult},
    session::{SessionError, SessionMode, SessionNotice, SessionRunner},
    signal::UserSignal,
    speech::{LocalSpeech, SpeechChannel},
    store::{FileStore, Repository},
};

use cli::{Cli, Commands, GenerateArgs};

const SIGNAL_QUEUE: usize = 16;
const NOTICE_QUEUE: usize = 64;

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    let paths = AppPaths::new();
    let settings_file = cli
        .config
        .clone()
        .unwrap_or_else(|| paths.settings_file.clone());
    let config = AppConfig::load_from(&settings_file)?;
    log::debug!("config: loaded from {}", settings_file.display());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let app = App::open(config, paths, settings_file)?;
    rt.block_on(app.run(cli.command))
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

struct App {
    config: AppConfig,
    paths: AppPaths,
    settings_file: PathBuf,
    repository: Repository,
    accounts: AccountService,
}

impl App {
    fn open(config: AppConfig, paths: AppPaths, settings_file: PathBuf) -> Result<Self> {
        let store_dir = config.storage.resolve_dir(&paths);
        let store = FileStore::open(&store_dir)
            .with_context(|| format!("cannot open store at {}", store_dir.display()))?;
        let repository = Repository::new(Arc::new(store));

        let remote = if config.cloud.enabled {
            let cloud = CloudAccounts::from_config(&config.cloud)?;
            Some(Arc::new(cloud) as Arc<dyn RemoteAccounts>)
        } else {
            None
        };
        let accounts = AccountService::new(repository.clone(), remote);

        Ok(Self {
            config,
            paths,
            settings_file,
            repository,
            accounts,
        })
    }

    async fn run(self, command: Commands) -> Result<()> {
        match command {
            Commands::Signup(args) => {
                let user = self
                    .accounts
                    .sign_up(&args.username, &args.email, &args.password)
                    .await?;
                println!("Account created. Signed in as {}.", user.display_name());
            }
            Commands::Signin(args) => {
                let user = self.accounts.sign_in(&args.login, &args.password).await?;
                println!("Signed in as {}.", user.display_name());
            }
            Commands::Signout => {
                self.accounts.sign_out()?;
                println!("Signed out.");
            }
            Commands::Whoami => match self.accounts.current()? {
                Some(user) => {
                    println!("{} <{}>", user.display_name(), user.email);
                    if let Some(uid) = &user.uid {
                        println!("uid: {uid}");
                    }
                }
                None => println!("Not signed in."),
            },
            Commands::Generate(args) => self.generate(args).await?,
            Commands::List => self.list()?,
            Commands::Interview(args) => {
                let mode = if args.typed {
                    SessionMode::Typed
                } else {
                    SessionMode::Voice
                };
                self.interview(&args.id, mode).await?;
            }
            Commands::Feedback(args) => self.feedback(&args.result_id)?,
            Commands::Config(args) => {
                print!("{}", toml::to_string_pretty(&self.config)?);
                if args.save {
                    self.config.save_to(&self.settings_file)?;
                    println!("# saved to {}", self.settings_file.display());
                }
            }
        }
        Ok(())
    }

    fn user(&self) -> Result<CurrentUser> {
        Ok(self.accounts.require_current()?)
    }

    fn speech_channel(&self) -> Arc<SpeechChannel> {
        let model = self.paths.model_file(&self.config.speech.model);
        let speech = LocalSpeech::load(&model, &self.config.speech, &self.config.audio);
        Arc::new(SpeechChannel::new(
            Arc::new(speech),
            self.config.speech.listen_timeout(),
        ))
    }

    // -----------------------------------------------------------------------
    // generate
    // -----------------------------------------------------------------------

    async fn generate(&self, args: GenerateArgs) -> Result<()> {
        let user = self.user()?;

        let fields = if args.voice {
            self.voice_fields().await?
        } else {
            IntakeFields::manual(
                args.role.as_deref().unwrap_or_default(),
                args.kind.as_deref().unwrap_or_default(),
                args.experience.as_deref().unwrap_or_default(),
                args.technology.as_deref().unwrap_or_default(),
                args.count.as_deref().unwrap_or(DEFAULT_QUESTION_COUNT),
            )?
        };

        let interview = Interview::generate(&fields);
        self.repository
            .append_interview(user.namespace(), &interview)?;

        println!(
            "Created interview {} ({} {}, {} level, {} questions):",
            interview.id,
            interview.kind().label(),
            interview.role,
            interview.experience,
            interview.questions.len()
        );
        for (i, q) in interview.questions.iter().enumerate() {
            println!("  {}. {q}", i + 1);
        }
        println!("Start it with: rehearse interview {}", interview.id);
        Ok(())
    }

    /// Voice intake, falling back to typed entry when voice is unusable.
    async fn voice_fields(&self) -> Result<IntakeFields> {
        let channel = self.speech_channel();
        let mut signals = spawn_stdin_signals();
        println!("Answer each question aloud. Type `q` and Enter to cancel.");

        match intake::run_voice_intake(&channel, self.config.speech.max_retries, &mut signals).await
        {
            Ok(fields) => Ok(fields),
            Err(e @ (IntakeError::Unavailable(_) | IntakeError::RetriesExhausted { .. })) => {
                println!("{e}");
                println!("Switching to manual entry.");
                manual_fields(&mut signals).await
            }
            Err(e) => Err(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // list / feedback
    // -----------------------------------------------------------------------

    fn list(&self) -> Result<()> {
        let user = self.user()?;
        let interviews = self.repository.interviews(user.namespace())?;
        let results = self.repository.results(user.namespace())?;

        if interviews.is_empty() {
            println!("No interviews yet. Create one with `rehearse generate`.");
        } else {
            println!("Interviews:");
            for i in &interviews {
                println!(
                    "  {}  {} · {} · {} · {} questions · {}",
                    i.id,
                    i.role,
                    i.interview_type,
                    i.experience,
                    i.questions.len(),
                    i.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        if !results.is_empty() {
            println!("Results:");
            for r in &results {
                println!(
                    "  {}  {} · {}% · {}",
                    r.id,
                    r.role,
                    r.confidence_score,
                    r.completed_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Ok(())
    }

    fn feedback(&self, result_id: &str) -> Result<()> {
        let user = self.user()?;
        let Some(result) = self.repository.find_result(user.namespace(), result_id)? else {
            bail!("no result with id {result_id}");
        };
        let interview = self
            .repository
            .find_interview(user.namespace(), &result.interview_id)?;
        print_result(&result, interview.as_ref());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // interview
    // -----------------------------------------------------------------------

    async fn interview(&self, id: &str, mode: SessionMode) -> Result<()> {
        let user = self.user()?;
        let Some(interview) = self.repository.find_interview(user.namespace(), id)? else {
            bail!("no interview with id {id}");
        };

        let (notice_tx, notice_rx) = mpsc::channel(NOTICE_QUEUE);
        let printer = tokio::spawn(print_notices(notice_rx));

        let runner = SessionRunner::new(
            self.speech_channel(),
            self.repository.clone(),
            user.namespace(),
        )
        .with_notices(notice_tx);

        let mut signals = spawn_stdin_signals();
        match mode {
            SessionMode::Voice => println!(
                "Speak your answer, then press Enter for the next question. \
                 `r` retries the microphone, `q` quits."
            ),
            SessionMode::Typed => println!(
                "Type your answer (several lines are fine), then an empty line for the next \
                 question. `q` quits."
            ),
        }

        let outcome = runner.run(interview.clone(), mode, &mut signals).await;
        drop(runner);
        wait_for_printer(printer).await;

        match outcome {
            Ok(result) => {
                print_result(&result, Some(&interview));
                Ok(())
            }
            Err(SessionError::Persist { result, source }) => {
                print_result(&result, Some(&interview));
                Err(source).context("the result above could not be saved")
            }
            Err(SessionError::Unavailable(reason)) => {
                bail!("voice is unavailable ({reason}); run again with --typed")
            }
            Err(SessionError::Cancelled) => {
                println!("Interview cancelled. Nothing was saved.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Terminal helpers
// ---------------------------------------------------------------------------

fn parse_signal(line: &str) -> UserSignal {
    match line.trim() {
        "" => UserSignal::Finish,
        "q" | "quit" => UserSignal::Cancel,
        "r" | "retry" => UserSignal::Retry,
        text => UserSignal::Typed(text.to_string()),
    }
}

/// Forward stdin lines as signals from a dedicated thread.  The channel
/// closes at end of input.
fn spawn_stdin_signals() -> mpsc::Receiver<UserSignal> {
    let (tx, rx) = mpsc::channel(SIGNAL_QUEUE);
    let spawned = std::thread::Builder::new()
        .name("stdin-signals".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(parse_signal(&line)).is_err() {
                    break;
                }
            }
            log::debug!("stdin: reader finished");
        });
    if let Err(e) = spawned {
        log::error!("stdin: failed to spawn reader: {e}");
    }
    rx
}

async fn manual_fields(signals: &mut mpsc::Receiver<UserSignal>) -> Result<IntakeFields> {
    let mut values: Vec<String> = Vec::with_capacity(FIELDS.len());
    for field in &FIELDS {
        println!("{}?", field.label);
        loop {
            match signals.recv().await {
                Some(UserSignal::Typed(text)) => {
                    values.push(text);
                    break;
                }
                Some(UserSignal::Cancel) | None => bail!(IntakeError::Cancelled),
                Some(_) => println!("{} is required.", field.label),
            }
        }
    }
    Ok(IntakeFields::manual(
        &values[0], &values[1], &values[2], &values[3], &values[4],
    )?)
}

async fn print_notices(mut notices: mpsc::Receiver<SessionNotice>) {
    while let Some(notice) = notices.recv().await {
        match notice {
            // The question text itself is spoken (or echoed when no TTS is set).
            SessionNotice::Question { index, total, .. } => {
                println!("\n[{}/{total}]", index + 1)
            }
            SessionNotice::Listening { .. } => println!("(listening…)"),
            SessionNotice::Transcript { text, .. } => println!("  > {text}"),
            SessionNotice::CaptureRestarted { .. } => println!("(microphone restarted)"),
            SessionNotice::Blocked { message } => {
                println!("Microphone stopped: {message}. Type `r` to retry or Enter to skip.")
            }
            SessionNotice::AnswerSaved { index, total, .. } => {
                println!("Answer {} of {total} saved.", index + 1)
            }
            SessionNotice::Scored {
                result_id,
                confidence,
            } => println!("\nScored {confidence}% (result {result_id})."),
            SessionNotice::Cancelled => println!("Cancelling…"),
        }
    }
}

/// `false` when the printer task panicked or was cancelled.
async fn wait_for_printer(printer: tokio::task::JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("session progress printer failed: {e}");
            false
        }
    }
}

fn print_result(result: &InterviewResult, interview: Option<&Interview>) {
    let level = PerformanceLevel::from_score(result.confidence_score);
    println!("\n{} interview, {}", result.role, result.completed_at.format("%Y-%m-%d %H:%M"));
    println!("Confidence: {}% ({level})\n", result.confidence_score);
    println!("{}\n", result.feedback_text);

    for (i, answer) in result.answers.iter().enumerate() {
        if let Some(question) = interview.and_then(|iv| iv.questions.get(i)) {
            println!("Q{}: {question}", i + 1);
        }
        if answer.is_empty() {
            println!("A{}: (no answer)", i + 1);
        } else {
            println!("A{}: {answer}", i + 1);
        }
    }
}
