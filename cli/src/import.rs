use anyhow::{anyhow, Context, Result};
use askboard_core::rating::{answer_rating, RatingWeights};
use askboard_core::store::SledStore;
use askboard_core::{QuestionId, UserId};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn default_avatar() -> String { "avatars/default.png".to_string() }

/// One line of an import file, discriminated by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Profile {
        user_id: UserId,
        name: String,
        #[serde(default = "default_avatar")]
        avatar: String,
    },
    Tag {
        title: String,
    },
    Question {
        /// External id, referenced by answers in the same import.
        id: String,
        title: String,
        #[serde(default)]
        text: String,
        author: UserId,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        likes: u64,
        #[serde(default)]
        dislikes: u64,
    },
    Answer {
        question: String,
        author: UserId,
        #[serde(default)]
        text: String,
        #[serde(default)]
        is_correct: bool,
        #[serde(default)]
        likes: u64,
        #[serde(default)]
        dislikes: u64,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub profiles: usize,
    pub tags: usize,
    pub questions: usize,
    pub answers: usize,
}

/// Collects `.json` / `.jsonl` files under `input` (or `input` itself), sorted by path.
fn input_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn read_records(file: &Path) -> Result<Vec<Record>> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut out = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let record = serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), n + 1))?;
            out.push(record);
        }
        return Ok(out);
    }
    let json: serde_json::Value = serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| serde_json::from_value(v).with_context(|| format!("record in {}", file.display())))
            .collect(),
        obj @ serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(obj)?]),
        _ => Ok(Vec::new()),
    }
}

/// Rejects inputs that would fail halfway through: duplicate question ids and answers
/// pointing at questions outside the import. Runs before anything is written.
fn validate(records: &[Record]) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::new();
    for record in records {
        if let Record::Question { id, .. } = record {
            if !ids.insert(id.as_str()) {
                return Err(anyhow!("duplicate question id '{id}'"));
            }
        }
    }
    for record in records {
        if let Record::Answer { question, .. } = record {
            if !ids.contains(question.as_str()) {
                return Err(anyhow!("answer references unknown question '{question}'"));
            }
        }
    }
    Ok(())
}

/// Loads every record found under `input` into `store`, then derives ratings:
/// questions and answers from their reaction counts, profiles from authored activity.
/// Every profile touched by the import is rescored, including ones stored earlier.
pub fn import_path(store: &SledStore, input: &Path, weights: &RatingWeights) -> Result<ImportSummary> {
    let mut records = Vec::new();
    for file in input_files(input) {
        records.extend(read_records(&file)?);
    }
    tracing::info!(records = records.len(), "read import records");
    validate(&records)?;

    let mut summary = ImportSummary::default();
    let mut users: BTreeSet<UserId> = BTreeSet::new();
    let mut question_ids: HashMap<&str, QuestionId> = HashMap::new();
    let mut question_reactions: Vec<(QuestionId, u64, u64)> = Vec::new();

    // profiles and tags first so questions and answers may appear in any file order
    for record in &records {
        match record {
            Record::Profile { user_id, name, avatar } => {
                store.insert_profile(*user_id, name, avatar)?;
                users.insert(*user_id);
                summary.profiles += 1;
            }
            Record::Tag { title } => {
                store.insert_tag(title)?;
                summary.tags += 1;
            }
            _ => {}
        }
    }

    for record in &records {
        if let Record::Question { id, title, text, author, tags, likes, dislikes } = record {
            let mut tag_ids = Vec::with_capacity(tags.len());
            for tag in tags {
                tag_ids.push(store.insert_tag(tag)?.id);
            }
            let question = store.insert_question(title, text, *author, &tag_ids)?;
            question_ids.insert(id.as_str(), question.id);
            question_reactions.push((question.id, *likes, *dislikes));
            users.insert(*author);
            summary.questions += 1;
        }
    }

    for record in &records {
        if let Record::Answer { question, author, text, is_correct, likes, dislikes } = record {
            let question_id = *question_ids
                .get(question.as_str())
                .ok_or_else(|| anyhow!("answer references unknown question '{question}'"))?;
            let answer = store.insert_answer(question_id, *author, text, *is_correct)?;
            store.set_answer_rating(answer.id, answer_rating(weights, *likes, *dislikes, *is_correct))?;
            users.insert(*author);
            summary.answers += 1;
        }
    }

    for (id, likes, dislikes) in question_reactions {
        store.rescore_question(id, likes, dislikes, weights)?;
    }
    for user_id in users {
        // authors without a profile have no rating to keep current
        if store.profile(user_id)?.is_some() {
            store.rescore_profile(user_id, weights)?;
        }
    }
    store.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use askboard_core::store::PrimaryStore;
    use std::fs;
    use tempfile::tempdir;

    const FIXTURE: &str = r#"
{"kind":"profile","user_id":1,"name":"Asker"}
{"kind":"profile","user_id":2,"name":"Helper","avatar":"avatars/h.png"}
{"kind":"question","id":"q1","title":"Borrowing?","author":1,"tags":["rust","borrowck"],"likes":4,"dislikes":1}
{"kind":"answer","question":"q1","author":2,"text":"use a ref","is_correct":true,"likes":2,"dislikes":1}
{"kind":"answer","question":"q1","author":2,"text":"clone it"}
{"kind":"tag","title":"unused"}
"#;

    #[test]
    fn imports_and_derives_ratings() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("board.jsonl"), FIXTURE).unwrap();
        let store = SledStore::temporary().unwrap();
        let w = RatingWeights::default();

        let summary = import_path(&store, dir.path(), &w).unwrap();
        assert_eq!(summary, ImportSummary { profiles: 2, tags: 1, questions: 1, answers: 2 });

        let counts = store.tag_question_counts().unwrap();
        assert_eq!(counts.len(), 3);
        let profiles = store.profiles().unwrap();
        assert_eq!(profiles[0].rating, 2); // one question
        assert_eq!(profiles[1].rating, 3 + 3 + 5); // two answers, one correct
        assert_eq!(profiles[1].avatar, "avatars/h.png");

        let rust = counts.iter().find(|c| c.tag.title == "rust").unwrap();
        let ids = store.tag_questions(rust.tag.id).unwrap();
        assert_eq!(ids.len(), 1);
        let question = store.question(ids[0]).unwrap().unwrap();
        assert_eq!(question.rating, 4 - 1 + 2 * 3);
        assert_eq!(question.tags.len(), 2);
    }

    #[test]
    fn unknown_question_reference_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.json");
        fs::write(&file, r#"[{"kind":"answer","question":"nope","author":1}]"#).unwrap();
        let store = SledStore::temporary().unwrap();
        let err = import_path(&store, &file, &RatingWeights::default()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn later_import_rescores_existing_authors() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("profiles.jsonl");
        let second = dir.path().join("questions.jsonl");
        fs::write(&first, r#"{"kind":"profile","user_id":1,"name":"Asker"}"#).unwrap();
        fs::write(
            &second,
            concat!(
                r#"{"kind":"question","id":"a","title":"One?","author":1}"#, "\n",
                r#"{"kind":"question","id":"b","title":"Two?","author":1}"#, "\n",
                r#"{"kind":"answer","question":"a","author":9,"text":"no profile here"}"#, "\n",
            ),
        )
        .unwrap();
        let store = SledStore::temporary().unwrap();
        let w = RatingWeights::default();

        import_path(&store, &first, &w).unwrap();
        assert_eq!(store.profile(1).unwrap().unwrap().rating, 0);
        import_path(&store, &second, &w).unwrap();
        assert_eq!(store.profile(1).unwrap().unwrap().rating, 2 * 2);
        assert!(store.profile(9).unwrap().is_none());
    }

    #[test]
    fn failed_import_writes_nothing() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.jsonl");
        let bad = dir.path().join("bad.jsonl");
        fs::write(
            &good,
            concat!(
                r#"{"kind":"profile","user_id":1,"name":"Asker"}"#, "\n",
                r#"{"kind":"question","id":"q1","title":"Lifetimes?","author":1,"tags":["rust"]}"#, "\n",
            ),
        )
        .unwrap();
        fs::write(
            &bad,
            concat!(
                r#"{"kind":"profile","user_id":1,"name":"Renamed"}"#, "\n",
                r#"{"kind":"question","id":"q2","title":"Traits?","author":1,"tags":["rust"]}"#, "\n",
                r#"{"kind":"answer","question":"missing","author":1}"#, "\n",
            ),
        )
        .unwrap();
        let store = SledStore::temporary().unwrap();
        let w = RatingWeights::default();

        import_path(&store, &good, &w).unwrap();
        assert!(import_path(&store, &bad, &w).is_err());

        let profile = store.profile(1).unwrap().unwrap();
        assert_eq!(profile.name, "Asker");
        assert_eq!(profile.rating, 2);
        let counts = store.tag_question_counts().unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].question_count, 1);
    }

    #[test]
    fn duplicate_question_ids_are_rejected_up_front() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("dup.jsonl");
        fs::write(
            &file,
            concat!(
                r#"{"kind":"question","id":"q","title":"First","author":1,"tags":["go"]}"#, "\n",
                r#"{"kind":"question","id":"q","title":"Second","author":1}"#, "\n",
            ),
        )
        .unwrap();
        let store = SledStore::temporary().unwrap();
        let err = import_path(&store, &file, &RatingWeights::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate question id 'q'"));
        assert!(store.tag_question_counts().unwrap().is_empty());
    }
}
