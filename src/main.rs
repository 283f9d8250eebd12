use std::sync::Arc;

use anyhow::{Context, bail};
use log::{info, warn};
use recognizer::{
    AppConfig, DatasetStore, EventSink, InferenceEngine, ModelHandle, RecognizerErr, Sample,
    TrainingEvent, TrainingPipeline, storage::FileStore,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

const HELP: &str = "\
commands:
  add <label> <64 bits>     store a drawing, rows may be split with '/'
  remove <label> <index>    delete a drawing, index 0 is the newest
  list                      show the dataset
  train                     train a new classifier in the background
  cancel                    abort the running training
  predict <64 bits>         classify a drawing
  quit";

enum Command {
    Add { label: String, sample: Sample },
    Remove { label: String, index: usize },
    List,
    Train,
    Cancel,
    Predict(Sample),
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> anyhow::Result<Self> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let cmd = match name {
            "add" => {
                let Some((label, bits)) = rest.split_once(char::is_whitespace) else {
                    bail!("usage: add <label> <64 bits>");
                };
                Self::Add {
                    label: label.to_string(),
                    sample: bits.parse()?,
                }
            }
            "remove" => {
                let mut args = rest.split_whitespace();
                let (Some(label), Some(index), None) = (args.next(), args.next(), args.next())
                else {
                    bail!("usage: remove <label> <index>");
                };
                Self::Remove {
                    label: label.to_string(),
                    index: index.parse().context("index must be a non-negative number")?,
                }
            }
            "list" => Self::List,
            "train" => Self::Train,
            "cancel" => Self::Cancel,
            "predict" => Self::Predict(rest.parse()?),
            "help" | "" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command {other:?}, try 'help'"),
        };

        Ok(cmd)
    }
}

struct Console {
    store: DatasetStore,
    pipeline: Arc<TrainingPipeline>,
    engine: InferenceEngine,
    running: Option<CancellationToken>,
}

impl Console {
    /// Runs a single command, returns `false` once the console should exit.
    fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Add { label, sample } => {
                if let Err(e) = self.store.add(&label, sample) {
                    warn!("failed to persist the dataset: {e}");
                }
                let count = self.store.samples(&label).map_or(0, <[Sample]>::len);
                println!("label {label}: {count} sample(s)");
            }
            Command::Remove { label, index } => match self.store.remove(&label, index) {
                Ok(Some(_)) => println!("removed sample {index} from label {label}"),
                Ok(None) => println!("nothing to remove"),
                Err(e) => warn!("failed to persist the dataset: {e}"),
            },
            Command::List => {
                for view in self.store.display() {
                    println!("label {} ({} sample(s))", view.label, view.count());
                    for (i, sample) in view.samples.iter().enumerate() {
                        println!("[{i}]\n{sample}");
                    }
                }
                println!("{} sample(s) total", self.store.len());
            }
            Command::Train => self.train(),
            Command::Cancel => {
                if !self.cancel() {
                    println!("no training to cancel");
                }
            }
            Command::Predict(sample) => match self.engine.predict(&sample) {
                Ok(Some(digit)) => println!("prediction: {digit}"),
                Ok(None) => println!("no classifier trained yet, run 'train' first"),
                Err(e) => println!("prediction failed: {e}"),
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => return false,
        }

        true
    }

    /// Cancels the run in flight, the token of a finished run is discarded.
    fn cancel(&mut self) -> bool {
        let Some(token) = self.running.take() else {
            return false;
        };
        if !self.pipeline.is_training() {
            return false;
        }

        token.cancel();
        true
    }

    fn train(&mut self) {
        if self.pipeline.is_training() {
            println!("a training run is already in progress");
            return;
        }

        let cancel = CancellationToken::new();
        let pipeline = Arc::clone(&self.pipeline);
        let dataset = self.store.snapshot();
        let token = cancel.clone();

        tokio::spawn(async move {
            match pipeline.train(dataset, token).await {
                Ok(report) => {
                    println!("training finished, accuracy {:.4}", report.accuracy)
                }
                Err(RecognizerErr::Cancelled) => println!("training cancelled"),
                Err(e) => println!("training failed: {e}"),
            }
        });

        self.running = Some(cancel);
    }
}

async fn report(mut events: mpsc::UnboundedReceiver<TrainingEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TrainingEvent::Started {
                samples,
                train,
                validation,
            } => {
                let split = format!("{train} train, {validation} validation");
                println!("training on {samples} sample(s) ({split})");
            }
            TrainingEvent::Epoch {
                epoch,
                epochs,
                loss,
                accuracy,
                val_loss,
                val_accuracy,
            } => {
                let val = match (val_loss, val_accuracy) {
                    (Some(l), Some(a)) => format!(", val_loss {l:.4}, val_acc {a:.4}"),
                    _ => String::new(),
                };
                println!("epoch {epoch}/{epochs}: loss {loss:.4}, acc {accuracy:.4}{val}");
            }
            TrainingEvent::Finished { .. }
            | TrainingEvent::Cancelled
            | TrainingEvent::Rejected { .. }
            | TrainingEvent::Failed { .. } => {}
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().context("loading config")?;
    let storage = FileStore::new(&config.data_dir)
        .with_context(|| format!("opening {}", config.data_dir.display()))?;
    let store = DatasetStore::load(Arc::new(storage)).context("loading dataset")?;
    info!(
        "loaded {} sample(s) from {}",
        store.len(),
        config.data_dir.display()
    );

    let model = ModelHandle::new();
    let (events, rx) = EventSink::channel();
    tokio::spawn(report(rx));

    let pipeline = TrainingPipeline::new(config.training, model.clone())
        .context("invalid training config")?
        .with_events(events);
    let mut console = Console {
        store,
        pipeline: Arc::new(pipeline),
        engine: InferenceEngine::new(model),
        running: None,
    };

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Ok(cmd) => {
                        if !console.handle(cmd) {
                            break;
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
            _ = signal::ctrl_c() => {
                info!("received SIGINT");
                break;
            }
        }
    }

    if let Some(token) = console.running.take() {
        token.cancel();
    }

    Ok(())
}
