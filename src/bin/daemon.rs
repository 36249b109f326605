use std::io::{Read, Write};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread;

use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tabletalk::config::{LogArgs, ModelArgs, StoreArgs};
use tabletalk::{logging, Answer, Pipeline, Session, Stage};

/// Serve questions about a loaded table over a unix socket.
///
/// Each connection writes one JSON request, shuts down its write half and
/// reads back one JSON reply.
#[derive(Parser, Debug)]
#[command(name = "tabletalk-daemon", version)]
struct Cli {
    #[arg(long, default_value = "/tmp/tabletalk.sock")]
    socket: PathBuf,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    log: LogArgs,
}

#[derive(Deserialize)]
struct Request {
    question: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Reply {
    Answer(Answer),
    Failure {
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
        error: String,
    },
}

struct Job {
    question: String,
    reply: Sender<Reply>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(&cli.log)?;

    let session = Session::open(cli.store.store(), &cli.store.table)
        .wrap_err("load a dataset with `tabletalk --csv` before starting the daemon")?;
    let pipeline = Pipeline::new(cli.model.generator()?, cli.model.policy());

    // At most two questions wait while one is being answered.
    let (jobs, queue) = bounded::<Job>(2);

    thread::spawn(move || serve(pipeline, session, queue));

    remove_stale_socket(&cli.socket)?;

    let listener = UnixListener::bind(&cli.socket)?;

    tracing::info!(socket = %cli.socket.display(), "listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let jobs = jobs.clone();
        thread::spawn(move || {
            if let Err(e) = handle(stream, &jobs) {
                tracing::warn!(error = %e, "connection failed");
            }
        });
    }

    Ok(())
}

/// Remove a socket left behind by an earlier run. Anything else at `path`
/// is left alone and makes binding fail.
fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path)
            .wrap_err_with(|| format!("failed to remove stale socket {}", path.display())),
        Ok(_) => Err(eyre::eyre!("{} exists and is not a socket", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).wrap_err_with(|| format!("failed to inspect {}", path.display())),
    }
}

/// The only thread that touches the pipeline; questions are answered one at a time.
fn serve(mut pipeline: Pipeline, session: Session, queue: Receiver<Job>) {
    for job in queue {
        let reply = match pipeline.answer(&session, &job.question) {
            Ok(answer) => Reply::Answer(answer),
            Err(e) => Reply::Failure {
                stage: Some(e.stage()),
                error: e.to_string(),
            },
        };

        let _ = job.reply.send(reply);
    }
}

fn handle(mut stream: UnixStream, jobs: &Sender<Job>) -> Result<()> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;

    let reply = match serde_json::from_slice::<Request>(&buf) {
        Ok(request) => {
            let (tx, rx) = bounded(1);
            jobs.send(Job {
                question: request.question,
                reply: tx,
            })?;
            rx.recv()?
        }
        Err(e) => Reply::Failure {
            stage: None,
            error: format!("malformed request: {e}"),
        },
    };

    serde_json::to_writer(&mut stream, &reply)?;
    stream.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_socket_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabletalk.sock");
        drop(UnixListener::bind(&path).unwrap());

        remove_stale_socket(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn regular_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        std::fs::write(&path, b"not a socket").unwrap();

        assert!(remove_stale_socket(&path).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"not a socket");
    }

    #[test]
    fn missing_path_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        remove_stale_socket(&dir.path().join("nothing.sock")).unwrap();
    }
}
