use crate::digest::SchemaDigest;

/// Bumped whenever the wording of [`PROMPT_TEMPLATE`] changes.
pub const PROMPT_VERSION: u32 = 1;

pub const PROMPT_TEMPLATE: &str = r#"You are an expert in converting English questions to SQL queries!
The SQL database has the table {TABLE} with the following columns - {COLUMNS}.
Column names are case-sensitive. Write every table and column name exactly as it is spelled in the database; a lowercase column must stay lowercase in the query.
For example,
Example 1 - How many entries of records are present?,
    the SQL command will be something like: SELECT COUNT(*) FROM {TABLE};
Example 2 - Retrieve all records where a certain condition holds,
    the SQL command will be something like: SELECT * FROM {TABLE} WHERE <condition>;

Important Notes:
{VALUES}

Use the correct values from the dataset when generating queries.

### IMPORTANT RULES:
- ONLY return a valid SQL query.
- DO NOT include any explanations, preambles, or formatting like triple backticks.
- SQL must be syntactically correct for SQLite.

Now convert the following question in English to a valid SQL query: {QUESTION}
No preamble, only valid SQL please.
"#;

/// Text sent to the model for one question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub version: u32,
    pub text: String,
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

pub fn compose(table: &str, columns: &[String], digest: &SchemaDigest, question: &str) -> Prompt {
    let columns = columns.join(", ");
    let values = digest.to_string();

    let text = render(PROMPT_TEMPLATE, |placeholder| match placeholder {
        "TABLE" => Some(table),
        "COLUMNS" => Some(columns.as_str()),
        "VALUES" => Some(values.as_str()),
        "QUESTION" => Some(question),
        _ => None,
    });

    Prompt {
        version: PROMPT_VERSION,
        text,
    }
}

/// Substitute `{NAME}` placeholders in a single pass.
///
/// Substituted text is never scanned again, so data values or questions that
/// happen to contain `{QUESTION}` come through literally. Unknown placeholders
/// are left as-is.
fn render<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        let replaced = tail[1..].find('}').and_then(|close| {
            let name = &tail[1..close + 1];
            lookup(name).map(|value| (value, close + 2))
        });

        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
