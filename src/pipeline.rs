use serde::Serialize;
use tabletalk_driver::{SqlGenerator, StatementPolicy};
use uuid::Uuid;

use crate::digest::build_digest;
use crate::error::{ExecutionError, LoadError, Result, Stage};
use crate::loader::{load_csv, DataSource};
use crate::prompt::compose;
use crate::store::{QueryResult, Store, TableRef};

/// The store and the dataset questions are asked against.
#[derive(Clone, Debug)]
pub struct Session {
    pub store: Store,
    pub table: TableRef,
}

impl Session {
    /// Load `source` into `table`, replacing whatever was there.
    pub fn load(store: Store, source: &DataSource, table: &str) -> std::result::Result<Self, LoadError> {
        let table = load_csv(&store, source, table)?;
        Ok(Self { store, table })
    }

    /// Attach to a table that an earlier load left in the store.
    pub fn open(store: Store, table: &str) -> std::result::Result<Self, ExecutionError> {
        let table = store.table(table)?;
        Ok(Self { store, table })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Generating,
    Executing,
    Done,
    Failed(Stage),
}

/// A successful run: the statement the model wrote and what it returned.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Answer {
    pub sql: String,
    #[serde(flatten)]
    pub result: QueryResult,
}

pub struct Pipeline {
    generator: SqlGenerator,
    policy: StatementPolicy,
    state: RunState,
}

impl Pipeline {
    pub fn new(generator: SqlGenerator, policy: StatementPolicy) -> Self {
        Self {
            generator,
            policy,
            state: RunState::Idle,
        }
    }

    /// State the most recent run ended in.
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn policy(&self) -> StatementPolicy {
        self.policy
    }

    /// Answer one question. Nothing is retried; the first failure ends the run.
    pub fn answer(&mut self, session: &Session, question: &str) -> Result<Answer> {
        let run = Uuid::new_v4();
        let span = tracing::info_span!("answer", %run, table = %session.table.name);
        let _enter = span.enter();

        let outcome = self.run(session, question);

        match &outcome {
            Ok(answer) => {
                self.state = RunState::Done;
                tracing::info!(sql = %answer.sql, rows = answer.result.rows.len(), "answered");
            }
            Err(e) => {
                let stage = e.stage();
                self.state = RunState::Failed(stage);
                tracing::warn!(%stage, error = %e, "run failed");
            }
        }

        outcome
    }

    fn run(&mut self, session: &Session, question: &str) -> Result<Answer> {
        self.state = RunState::Generating;

        let digest = build_digest(&session.store, &session.table)?;
        let prompt = compose(&session.table.name, &session.table.columns, &digest, question);

        tracing::debug!(
            version = prompt.version,
            disclosed = digest.disclosed.len(),
            backend = self.generator.backend_name(),
            "prompt composed"
        );

        let statement = self.generator.generate(&prompt.text)?;

        tracing::info!(sql = %statement, "generated statement");

        self.state = RunState::Executing;

        let result = session.store.execute(&statement, self.policy)?;

        Ok(Answer {
            sql: statement.into_inner(),
            result,
        })
    }
}
