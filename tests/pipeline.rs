use std::sync::{Arc, Mutex};

use tabletalk::driver::{GenerationError, SqlGenerator, StatementPolicy, TextGenerator};
use tabletalk::loader::load_reader;
use tabletalk::{Error, RunState, Session, Stage, Store, Value};
use tabletalk::{ExecutionError, Pipeline};

const DATA: &str = "id,category,amount\n1,A,10\n2,B,20\n3,A,30\n4,B,40\n5,A,50\n";

/// Answers questions from a fixed script and keeps every prompt it was sent.
struct Scripted {
    script: Vec<(&'static str, Result<&'static str, &'static str>)>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl TextGenerator for Scripted {
    fn complete(&mut self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        self.script
            .iter()
            .find(|(question, _)| prompt.contains(question))
            .map(|(_, reply)| match *reply {
                Ok(sql) => Ok(sql.to_string()),
                Err("unauthorized") => Err(GenerationError::Unauthorized {
                    status: 401,
                    body: "invalid api key".into(),
                }),
                Err(reason) => Err(GenerationError::Unreachable(reason.into())),
            })
            .unwrap_or_else(|| Ok(String::new()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    session: Session,
    pipeline: Pipeline,
    prompts: Arc<Mutex<Vec<String>>>,
}

fn harness(policy: StatementPolicy) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path().join("data.db"));
    let table = load_reader(&store, DATA.as_bytes(), "DATA").unwrap();
    let session = Session { store, table };

    let prompts = Arc::new(Mutex::new(Vec::new()));
    let scripted = Scripted {
        script: vec![
            ("How many entries are present?", Ok("SELECT COUNT(*) FROM DATA;")),
            (
                "Show all rows where category is A",
                Ok("```sql\nSELECT * FROM DATA WHERE category = 'A';\n```"),
            ),
            ("Forget everything", Ok("DELETE FROM DATA;")),
            ("What is the price?", Ok("SELECT price FROM DATA;")),
            ("Say something broken", Ok("SELEC * FROM DATA")),
            ("Is anyone there?", Err("connection refused")),
            ("Who am I?", Err("unauthorized")),
        ],
        prompts: prompts.clone(),
    };

    Harness {
        _dir: dir,
        session,
        pipeline: Pipeline::new(SqlGenerator::new(Box::new(scripted)), policy),
        prompts,
    }
}

fn row_count(h: &Harness) -> i64 {
    let result = h
        .session
        .store
        .execute(
            &tabletalk::driver::UntrustedStatement::new("SELECT COUNT(*) FROM DATA"),
            StatementPolicy::ReadOnly,
        )
        .unwrap();
    match result.rows[0][0] {
        Value::Integer(n) => n,
        ref other => panic!("unexpected count {other:?}"),
    }
}

#[test]
fn counts_entries() {
    let mut h = harness(StatementPolicy::Unrestricted);

    let answer = h.pipeline.answer(&h.session, "How many entries are present?").unwrap();

    assert_eq!(answer.sql, "SELECT COUNT(*) FROM DATA;");
    assert_eq!(answer.result.columns, vec!["COUNT(*)"]);
    assert_eq!(answer.result.rows, vec![vec![Value::Integer(5)]]);
    assert_eq!(h.pipeline.state(), RunState::Done);

    let prompts = h.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("- Column 'category' has unique values: ['A', 'B']"));
    assert!(prompts[0].contains("columns - id, category, amount."));
}

#[test]
fn filters_by_category() {
    let mut h = harness(StatementPolicy::ReadOnly);

    let answer = h
        .pipeline
        .answer(&h.session, "Show all rows where category is A")
        .unwrap();

    assert_eq!(answer.sql, "SELECT * FROM DATA WHERE category = 'A';");
    assert_eq!(answer.result.columns, vec!["id", "category", "amount"]);

    let ids = answer
        .result
        .rows
        .iter()
        .map(|row| row[0].clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![Value::Integer(1), Value::Integer(3), Value::Integer(5)]);
    assert!(answer
        .result
        .rows
        .iter()
        .all(|row| row[1] == Value::Text("A".into())));
}

#[test]
fn repeated_questions_are_idempotent() {
    let mut h = harness(StatementPolicy::Unrestricted);

    let first = h.pipeline.answer(&h.session, "Show all rows where category is A").unwrap();
    let second = h.pipeline.answer(&h.session, "Show all rows where category is A").unwrap();

    assert_eq!(first, second);

    let prompts = h.prompts.lock().unwrap();
    assert_eq!(prompts[0], prompts[1]);
}

#[test]
fn generation_failures_are_tagged() {
    let mut h = harness(StatementPolicy::Unrestricted);

    let err = h.pipeline.answer(&h.session, "Is anyone there?").unwrap_err();
    assert!(matches!(err, Error::Generation(GenerationError::Unreachable(_))));
    assert_eq!(err.stage(), Stage::Generating);
    assert_eq!(h.pipeline.state(), RunState::Failed(Stage::Generating));

    let err = h.pipeline.answer(&h.session, "Who am I?").unwrap_err();
    assert!(err.to_string().contains("invalid api key"), "{err}");
    assert_eq!(err.stage(), Stage::Generating);
}

#[test]
fn empty_completion_is_a_generation_error() {
    let mut h = harness(StatementPolicy::Unrestricted);

    let err = h.pipeline.answer(&h.session, "Something unscripted").unwrap_err();
    assert!(matches!(err, Error::Generation(GenerationError::EmptyCompletion)));
    assert_eq!(h.pipeline.state(), RunState::Failed(Stage::Generating));
}

#[test]
fn execution_failures_keep_store_message() {
    let mut h = harness(StatementPolicy::Unrestricted);

    let err = h.pipeline.answer(&h.session, "What is the price?").unwrap_err();
    assert!(matches!(err, Error::Execution(ExecutionError::Store(_))));
    assert!(err.to_string().contains("no such column: price"), "{err}");
    assert_eq!(h.pipeline.state(), RunState::Failed(Stage::Executing));

    let err = h.pipeline.answer(&h.session, "Say something broken").unwrap_err();
    assert_eq!(err.stage(), Stage::Executing);
    assert_eq!(row_count(&h), 5);
}

#[test]
fn a_failure_does_not_block_the_next_question() {
    let mut h = harness(StatementPolicy::Unrestricted);

    assert!(h.pipeline.answer(&h.session, "Is anyone there?").is_err());
    let answer = h.pipeline.answer(&h.session, "How many entries are present?").unwrap();
    assert_eq!(answer.result.rows, vec![vec![Value::Integer(5)]]);
}

#[test]
fn read_only_policy_refuses_destructive_statements() {
    let mut h = harness(StatementPolicy::ReadOnly);

    let err = h.pipeline.answer(&h.session, "Forget everything").unwrap_err();
    assert!(matches!(err, Error::Execution(ExecutionError::Refused(_))));
    assert_eq!(row_count(&h), 5);
}

#[test]
fn unrestricted_policy_runs_destructive_statements() {
    let mut h = harness(StatementPolicy::Unrestricted);

    let answer = h.pipeline.answer(&h.session, "Forget everything").unwrap();
    assert!(answer.result.is_empty());
    assert_eq!(row_count(&h), 0);
}

#[test]
fn unknown_column_fails_before_generation() {
    let mut h = harness(StatementPolicy::Unrestricted);
    h.session.table.columns.push("missing".into());

    let err = h.pipeline.answer(&h.session, "How many entries are present?").unwrap_err();
    assert!(matches!(err, Error::Execution(ExecutionError::NoSuchColumn { .. })));
    assert_eq!(h.pipeline.state(), RunState::Failed(err.stage()));
    assert_eq!(h.pipeline.state(), RunState::Failed(Stage::Executing));
    assert!(h.prompts.lock().unwrap().is_empty());
}

#[test]
fn dropped_table_reports_one_stage() {
    let mut h = harness(StatementPolicy::Unrestricted);
    h.session
        .store
        .execute(
            &tabletalk::driver::UntrustedStatement::new("DROP TABLE DATA"),
            StatementPolicy::Unrestricted,
        )
        .unwrap();

    let err = h.pipeline.answer(&h.session, "How many entries are present?").unwrap_err();
    assert!(err.to_string().contains("no such table: DATA"), "{err}");
    assert_eq!(h.pipeline.state(), RunState::Failed(err.stage()));
    assert!(h.prompts.lock().unwrap().is_empty());
}

#[test]
fn failed_state_always_matches_error_stage() {
    let mut h = harness(StatementPolicy::ReadOnly);

    for question in ["Is anyone there?", "What is the price?", "Forget everything", "Something unscripted"] {
        let err = h.pipeline.answer(&h.session, question).unwrap_err();
        assert_eq!(h.pipeline.state(), RunState::Failed(err.stage()), "{question}");
    }
}
