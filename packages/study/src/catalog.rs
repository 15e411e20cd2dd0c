//! Content catalog
//!
//! Loads the study content (`data.json`) and answers two questions for the
//! rest of the crate: which item keys are valid for a partition, and what to
//! show for a given key.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate {mode} id `{id}` in level {level}")]
    DuplicateKey {
        level: String,
        mode: StudyMode,
        id: String,
    },
}

// ============================================================
// Partition
// ============================================================

/// What kind of content is being studied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    Vocab,
    Text,
    Qna,
}

impl StudyMode {
    pub const ALL: [StudyMode; 3] = [StudyMode::Vocab, StudyMode::Text, StudyMode::Qna];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::Vocab => "vocab",
            StudyMode::Text => "text",
            StudyMode::Qna => "qna",
        }
    }

    /// Quiz-style modes let the learner grade themselves, so an item can fail.
    /// Texts are only read and revealed.
    pub fn is_quiz(&self) -> bool {
        matches!(self, StudyMode::Vocab | StudyMode::Qna)
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vocab" | "vocabulary" => Ok(StudyMode::Vocab),
            "text" | "texts" => Ok(StudyMode::Text),
            "qna" | "q&a" | "dialogue" => Ok(StudyMode::Qna),
            other => Err(format!("unknown study mode `{other}` (expected vocab, text or qna)")),
        }
    }
}

/// Independent weight universe: one difficulty level studied in one mode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub level: String,
    pub mode: StudyMode,
}

impl PartitionKey {
    pub fn new(level: impl Into<String>, mode: StudyMode) -> Self {
        Self {
            level: level.into(),
            mode,
        }
    }

    /// Key under which this partition's weights are persisted
    pub fn storage_key(&self) -> String {
        format!("w_{}_{}", self.level, self.mode)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.level, self.mode)
    }
}

// ============================================================
// Items
// ============================================================

/// Display payload for one reviewable unit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StudyItem {
    Vocab {
        term: String,
        meaning: String,
    },
    Text {
        id: String,
        chinese: String,
        translation: String,
    },
    Qna {
        id: String,
        question: String,
        answer: String,
        question_translation: String,
        answer_translation: String,
    },
}

/// Supplies the authoritative key set and payloads for each partition
pub trait CatalogProvider {
    fn valid_keys(&self, partition: &PartitionKey) -> BTreeSet<String>;

    fn item(&self, partition: &PartitionKey, key: &str) -> Option<StudyItem>;
}

// ============================================================
// On-disk format
// ============================================================

#[derive(Debug, Clone, Default, Deserialize)]
struct LevelData {
    #[serde(default)]
    vocab: BTreeMap<String, String>,
    #[serde(default)]
    text: Vec<TextEntry>,
    #[serde(default)]
    qna: Vec<QnaEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TextEntry {
    id: String,
    cn: String,
    pt: String,
}

#[derive(Debug, Clone, Deserialize)]
struct QnaEntry {
    id: String,
    cn: QnaPair,
    pt: QnaPair,
}

#[derive(Debug, Clone, Deserialize)]
struct QnaPair {
    q: String,
    a: String,
}

// ============================================================
// Catalog
// ============================================================

/// Study content keyed by level
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    levels: BTreeMap<String, LevelData>,
}

impl Catalog {
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let levels: BTreeMap<String, LevelData> = serde_json::from_str(json)?;
        let catalog = Self { levels };
        catalog.check_unique_ids()?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), levels = catalog.levels.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Level names in sorted order
    pub fn levels(&self) -> Vec<String> {
        self.levels.keys().cloned().collect()
    }

    pub fn has_level(&self, level: &str) -> bool {
        self.levels.contains_key(level)
    }

    /// Number of items a partition holds (0 for an unknown level)
    pub fn item_count(&self, partition: &PartitionKey) -> usize {
        let Some(data) = self.levels.get(&partition.level) else {
            return 0;
        };
        match partition.mode {
            StudyMode::Vocab => data.vocab.len(),
            StudyMode::Text => data.text.len(),
            StudyMode::Qna => data.qna.len(),
        }
    }

    fn check_unique_ids(&self) -> Result<(), CatalogError> {
        for (level, data) in &self.levels {
            let mut seen = HashSet::new();
            for id in data.text.iter().map(|t| &t.id) {
                if !seen.insert(id) {
                    return Err(CatalogError::DuplicateKey {
                        level: level.clone(),
                        mode: StudyMode::Text,
                        id: id.clone(),
                    });
                }
            }
            seen.clear();
            for id in data.qna.iter().map(|q| &q.id) {
                if !seen.insert(id) {
                    return Err(CatalogError::DuplicateKey {
                        level: level.clone(),
                        mode: StudyMode::Qna,
                        id: id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl CatalogProvider for Catalog {
    fn valid_keys(&self, partition: &PartitionKey) -> BTreeSet<String> {
        let Some(data) = self.levels.get(&partition.level) else {
            return BTreeSet::new();
        };
        match partition.mode {
            StudyMode::Vocab => data.vocab.keys().cloned().collect(),
            StudyMode::Text => data.text.iter().map(|t| t.id.clone()).collect(),
            StudyMode::Qna => data.qna.iter().map(|q| q.id.clone()).collect(),
        }
    }

    fn item(&self, partition: &PartitionKey, key: &str) -> Option<StudyItem> {
        let data = self.levels.get(&partition.level)?;
        match partition.mode {
            StudyMode::Vocab => data.vocab.get(key).map(|meaning| StudyItem::Vocab {
                term: key.to_string(),
                meaning: meaning.clone(),
            }),
            StudyMode::Text => data
                .text
                .iter()
                .find(|t| t.id == key)
                .map(|t| StudyItem::Text {
                    id: t.id.clone(),
                    chinese: t.cn.clone(),
                    translation: t.pt.clone(),
                }),
            StudyMode::Qna => data
                .qna
                .iter()
                .find(|q| q.id == key)
                .map(|q| StudyItem::Qna {
                    id: q.id.clone(),
                    question: q.cn.q.clone(),
                    answer: q.cn.a.clone(),
                    question_translation: q.pt.q.clone(),
                    answer_translation: q.pt.a.clone(),
                }),
        }
    }
}

// ============================================================
// Text helpers
// ============================================================

/// Split `"汉字 (hàn zì)"` into the characters and the trailing romanization.
///
/// Text without a trailing parenthesized group comes back unchanged with an
/// empty pinyin part.
pub fn split_pinyin(text: &str) -> (&str, &str) {
    let trimmed = text.trim_end();
    if let Some(without_close) = trimmed.strip_suffix(')') {
        if let Some(open) = without_close.rfind('(') {
            let pinyin = &without_close[open + 1..];
            let han = without_close[..open].trim_end();
            if !han.is_empty() && !pinyin.contains('(') && !pinyin.contains(')') {
                return (han, pinyin);
            }
        }
    }
    (text, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "HSK1": {
            "vocab": { "你好 (nǐ hǎo)": "olá", "谢谢 (xièxie)": "obrigado" },
            "text": [ { "id": "t1", "cn": "我是学生。(wǒ shì xuésheng.)", "pt": "Eu sou estudante." } ],
            "qna": [ { "id": "q1", "cn": { "q": "你好吗？", "a": "我很好。" }, "pt": { "q": "Como vai?", "a": "Vou bem." } } ]
        },
        "HSK2": { "vocab": {} }
    }"#;

    #[test]
    fn test_storage_key_format() {
        let key = PartitionKey::new("HSK1", StudyMode::Vocab);
        assert_eq!(key.storage_key(), "w_HSK1_vocab");
        assert_eq!(key.to_string(), "HSK1/vocab");
    }

    #[test]
    fn test_study_mode_parsing() {
        assert_eq!("vocab".parse::<StudyMode>(), Ok(StudyMode::Vocab));
        assert_eq!(" QNA ".parse::<StudyMode>(), Ok(StudyMode::Qna));
        assert!("grammar".parse::<StudyMode>().is_err());
        assert!(StudyMode::Vocab.is_quiz());
        assert!(StudyMode::Qna.is_quiz());
        assert!(!StudyMode::Text.is_quiz());
    }

    #[test]
    fn test_valid_keys_per_mode() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();

        let vocab = catalog.valid_keys(&PartitionKey::new("HSK1", StudyMode::Vocab));
        assert_eq!(vocab.len(), 2);
        assert!(vocab.contains("你好 (nǐ hǎo)"));

        let text = catalog.valid_keys(&PartitionKey::new("HSK1", StudyMode::Text));
        assert_eq!(text.into_iter().collect::<Vec<_>>(), vec!["t1".to_string()]);

        let qna = catalog.valid_keys(&PartitionKey::new("HSK1", StudyMode::Qna));
        assert!(qna.contains("q1"));
    }

    #[test]
    fn test_missing_level_and_mode_are_empty() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        assert!(catalog
            .valid_keys(&PartitionKey::new("HSK9", StudyMode::Vocab))
            .is_empty());
        assert!(catalog
            .valid_keys(&PartitionKey::new("HSK2", StudyMode::Text))
            .is_empty());
        assert_eq!(catalog.item_count(&PartitionKey::new("HSK9", StudyMode::Qna)), 0);
        assert_eq!(catalog.levels(), vec!["HSK1".to_string(), "HSK2".to_string()]);
    }

    #[test]
    fn test_item_payloads() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();

        let vocab = catalog.item(&PartitionKey::new("HSK1", StudyMode::Vocab), "谢谢 (xièxie)");
        assert_eq!(
            vocab,
            Some(StudyItem::Vocab {
                term: "谢谢 (xièxie)".to_string(),
                meaning: "obrigado".to_string(),
            })
        );

        match catalog.item(&PartitionKey::new("HSK1", StudyMode::Qna), "q1") {
            Some(StudyItem::Qna { answer, answer_translation, .. }) => {
                assert_eq!(answer, "我很好。");
                assert_eq!(answer_translation, "Vou bem.");
            }
            other => panic!("unexpected item {:?}", other),
        }

        assert!(catalog
            .item(&PartitionKey::new("HSK1", StudyMode::Text), "missing")
            .is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{ "HSK1": { "text": [
            { "id": "t1", "cn": "a", "pt": "a" },
            { "id": "t1", "cn": "b", "pt": "b" }
        ] } }"#;
        match Catalog::from_json_str(json) {
            Err(CatalogError::DuplicateKey { level, mode, id }) => {
                assert_eq!(level, "HSK1");
                assert_eq!(mode, StudyMode::Text);
                assert_eq!(id, "t1");
            }
            other => panic!("expected duplicate key error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(
            Catalog::from_json_str("{ not json"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Catalog::load("/definitely/not/here/data.json").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    // ============ split_pinyin ============

    #[test]
    fn test_split_pinyin() {
        assert_eq!(split_pinyin("你好 (nǐ hǎo)"), ("你好", "nǐ hǎo"));
        assert_eq!(split_pinyin("你好(nǐ hǎo)  "), ("你好", "nǐ hǎo"));
        assert_eq!(split_pinyin("我是学生。(wǒ shì xuésheng.)"), ("我是学生。", "wǒ shì xuésheng."));
        assert_eq!(split_pinyin("没有拼音"), ("没有拼音", ""));
        assert_eq!(split_pinyin("(only pinyin)"), ("(only pinyin)", ""));
        assert_eq!(split_pinyin("a (b (c))"), ("a (b (c))", ""));
        assert_eq!(split_pinyin("空 ()"), ("空", ""));
    }
}
