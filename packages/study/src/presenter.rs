//! Terminal presenter
//!
//! Line-oriented study loop over any `BufRead`/`Write` pair. Each round shows
//! the prompt side of a card, waits for Enter, reveals the answer and, in quiz
//! modes, asks whether the learner knew it.
//!
//! Commands accepted wherever the loop waits for a line:
//! - `q` quits
//! - `l <LEVEL>` switches level, keeping the mode
//! - `m <MODE>` switches mode, keeping the level

use std::io::{self, BufRead, Write};

use colored::Colorize;
use hsk_algo::ReviewOutcome;
use serde::Serialize;

use crate::catalog::{split_pinyin, CatalogProvider, PartitionKey, StudyItem, StudyMode};
use crate::session::{SessionError, StudySession};
use crate::storage::KeyValueStore;

#[derive(Debug, thiserror::Error)]
pub enum PresenterError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Tally of one interactive run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub rounds: usize,
    pub successes: usize,
    pub failures: usize,
}

impl RunStats {
    fn record(&mut self, outcome: ReviewOutcome) {
        self.rounds += 1;
        match outcome {
            ReviewOutcome::Success => self.successes += 1,
            ReviewOutcome::Failure => self.failures += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Continue,
    Quit,
    Level(String),
    Mode(StudyMode),
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head {
        "q" | "quit" if rest.is_empty() => Ok(Command::Quit),
        "l" | "level" => {
            if rest.is_empty() {
                Err("usage: l <LEVEL>".to_string())
            } else {
                Ok(Command::Level(rest.to_string()))
            }
        }
        "m" | "mode" => rest.parse::<StudyMode>().map(Command::Mode),
        _ => Ok(Command::Continue),
    }
}

fn parse_verdict(line: &str) -> Option<Option<ReviewOutcome>> {
    match line.trim().to_lowercase().as_str() {
        "q" | "quit" => Some(None),
        answer => answer.parse::<ReviewOutcome>().ok().map(Some),
    }
}

pub struct Presenter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Presenter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run rounds until the learner quits, input ends or `max_rounds`
    /// verdicts have been recorded.
    pub fn run<C, S>(
        &mut self,
        session: &mut StudySession<C, S>,
        max_rounds: Option<usize>,
    ) -> Result<RunStats, PresenterError>
    where
        C: CatalogProvider,
        S: KeyValueStore,
    {
        let mut stats = RunStats::default();

        loop {
            if max_rounds.is_some_and(|max| stats.rounds >= max) {
                break;
            }

            let drafted = match session.draft() {
                Ok(drafted) => drafted,
                Err(SessionError::EmptyPartition(partition)) => {
                    writeln!(
                        self.output,
                        "{}",
                        format!("Nothing to study in {partition}.").yellow()
                    )?;
                    writeln!(
                        self.output,
                        "{}",
                        "Switch with `l <LEVEL>` or `m <MODE>`, or `q` to quit.".dimmed()
                    )?;
                    match self.read_command()? {
                        None | Some(Command::Quit) => break,
                        Some(Command::Continue) => continue,
                        Some(command) => {
                            self.switch(session, command)?;
                            continue;
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            };

            let quiz = session.active_partition().is_some_and(|p| p.mode.is_quiz());
            if let Some(partition) = session.active_partition() {
                writeln!(
                    self.output,
                    "\n{}",
                    format!("[{}] #{}", partition, stats.rounds + 1).cyan().bold()
                )?;
            }
            self.show_front(&drafted.item)?;
            writeln!(
                self.output,
                "{}",
                "[Enter] reveal | q quit | l <LEVEL> | m <MODE>".dimmed()
            )?;

            match self.read_command()? {
                None | Some(Command::Quit) => break,
                Some(Command::Continue) => {}
                Some(command) => {
                    // abandoned round, weights untouched
                    self.switch(session, command)?;
                    continue;
                }
            }

            self.show_back(&drafted.item)?;

            let outcome = if quiz {
                match self.read_verdict()? {
                    Some(outcome) => outcome,
                    None => break,
                }
            } else {
                ReviewOutcome::Success
            };

            let report = session.reinforce(&drafted.key, outcome)?;
            tracing::debug!(
                key = %report.key,
                outcome = %outcome.as_str(),
                previous = report.previous_weight,
                new = report.new_weight,
                "round recorded"
            );
            stats.record(outcome);
        }

        writeln!(
            self.output,
            "\n{} {} reviewed, {} known, {} missed",
            "Done.".green().bold(),
            stats.rounds,
            stats.successes,
            stats.failures
        )?;
        self.output.flush()?;

        Ok(stats)
    }

    // ==================== Input ====================

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// `None` when input is exhausted
    fn read_command(&mut self) -> io::Result<Option<Command>> {
        loop {
            write!(self.output, "> ")?;
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            match parse_command(&line) {
                Ok(command) => return Ok(Some(command)),
                Err(message) => writeln!(self.output, "{}", message.red())?,
            }
        }
    }

    /// `None` means quit without recording a verdict
    fn read_verdict(&mut self) -> io::Result<Option<ReviewOutcome>> {
        loop {
            write!(self.output, "{} ", "Did you know it? [y/n]".bold())?;
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            match parse_verdict(&line) {
                Some(verdict) => return Ok(verdict),
                None => writeln!(self.output, "{}", "answer y or n (q quits)".red())?,
            }
        }
    }

    fn switch<C, S>(
        &mut self,
        session: &mut StudySession<C, S>,
        command: Command,
    ) -> Result<(), PresenterError>
    where
        C: CatalogProvider,
        S: KeyValueStore,
    {
        let current = session
            .active_partition()
            .cloned()
            .ok_or(SessionError::NoActivePartition)?;

        let target = match command {
            Command::Level(level) => PartitionKey::new(level, current.mode),
            Command::Mode(mode) => PartitionKey::new(current.level, mode),
            Command::Continue | Command::Quit => return Ok(()),
        };

        let summary = session.activate(target)?;
        writeln!(
            self.output,
            "{} {} ({} items)",
            "Now studying".green(),
            summary.partition,
            summary.item_count
        )?;
        Ok(())
    }

    // ==================== Rendering ====================

    fn write_chinese(&mut self, text: &str) -> io::Result<()> {
        let (han, pinyin) = split_pinyin(text);
        writeln!(self.output, "  {}", han.bold())?;
        if !pinyin.is_empty() {
            writeln!(self.output, "  {}", pinyin.dimmed())?;
        }
        Ok(())
    }

    fn show_front(&mut self, item: &StudyItem) -> io::Result<()> {
        match item {
            StudyItem::Vocab { term, .. } => self.write_chinese(term),
            StudyItem::Text { chinese, .. } => self.write_chinese(chinese),
            StudyItem::Qna { question, .. } => {
                writeln!(self.output, "{}", "Q:".yellow())?;
                self.write_chinese(question)
            }
        }
    }

    fn show_back(&mut self, item: &StudyItem) -> io::Result<()> {
        match item {
            StudyItem::Vocab { meaning, .. } => {
                writeln!(self.output, "  = {}", meaning)?;
            }
            StudyItem::Text { translation, .. } => {
                writeln!(self.output, "  = {}", translation)?;
            }
            StudyItem::Qna {
                answer,
                question_translation,
                answer_translation,
                ..
            } => {
                writeln!(self.output, "  = {}", question_translation)?;
                writeln!(self.output, "{}", "A:".yellow())?;
                self.write_chinese(answer)?;
                writeln!(self.output, "  = {}", answer_translation)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::storage::MemoryStore;
    use crate::weight_store::WeightStore;
    use hsk_algo::Drafter;
    use std::io::Cursor;

    const DATA: &str = r#"{
        "HSK1": {
            "vocab": { "你好 (nǐ hǎo)": "olá" },
            "text": [ { "id": "t1", "cn": "我是学生。", "pt": "Eu sou estudante." } ],
            "qna": [ { "id": "q1", "cn": { "q": "你好吗？", "a": "我很好。" }, "pt": { "q": "Como vai?", "a": "Vou bem." } } ]
        },
        "HSK2": { "vocab": {} }
    }"#;

    fn session_at(partition: PartitionKey) -> StudySession<Catalog, MemoryStore> {
        let mut session = StudySession::new(
            Catalog::from_json_str(DATA).unwrap(),
            WeightStore::new(MemoryStore::new()),
            Drafter::with_seed(5),
        );
        session.activate(partition).unwrap();
        session
    }

    fn run(
        session: &mut StudySession<Catalog, MemoryStore>,
        script: &str,
        max_rounds: Option<usize>,
    ) -> (RunStats, String) {
        let mut presenter = Presenter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new());
        let stats = presenter.run(session, max_rounds).unwrap();
        let output = String::from_utf8(presenter.into_output()).unwrap();
        (stats, output)
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("\n"), Ok(Command::Continue));
        assert_eq!(parse_command("anything"), Ok(Command::Continue));
        assert_eq!(parse_command(" q \n"), Ok(Command::Quit));
        assert_eq!(parse_command("l HSK2"), Ok(Command::Level("HSK2".to_string())));
        assert_eq!(parse_command("m qna"), Ok(Command::Mode(StudyMode::Qna)));
        assert!(parse_command("l").is_err());
        assert!(parse_command("m grammar").is_err());
    }

    #[test]
    fn test_parse_verdict() {
        assert_eq!(parse_verdict("y\n"), Some(Some(ReviewOutcome::Success)));
        assert_eq!(parse_verdict("N"), Some(Some(ReviewOutcome::Failure)));
        assert_eq!(parse_verdict("q"), Some(None));
        assert_eq!(parse_verdict("maybe"), None);
    }

    #[test]
    fn test_vocab_round_reveal_and_verdict() {
        let partition = PartitionKey::new("HSK1", StudyMode::Vocab);
        let mut session = session_at(partition);

        let (stats, output) = run(&mut session, "\nn\n\ny\nq\n", None);

        assert_eq!(
            stats,
            RunStats {
                rounds: 2,
                successes: 1,
                failures: 1
            }
        );
        assert!(output.contains("你好"));
        assert!(output.contains("nǐ hǎo"));
        assert!(output.contains("olá"));
        // the success after the miss suppresses the card again
        assert_eq!(session.weights().unwrap().get("你好 (nǐ hǎo)"), Some(0.1));
    }

    #[test]
    fn test_text_mode_skips_verdict() {
        let mut session = session_at(PartitionKey::new("HSK1", StudyMode::Text));

        let (stats, output) = run(&mut session, "\n\n\n", Some(2));

        assert_eq!(stats.rounds, 2);
        assert_eq!(stats.failures, 0);
        assert!(!output.contains("Did you know it?"));
        assert!(output.contains("Eu sou estudante."));
    }

    #[test]
    fn test_quit_before_reveal_records_nothing() {
        let mut session = session_at(PartitionKey::new("HSK1", StudyMode::Vocab));

        let (stats, output) = run(&mut session, "q\n", None);

        assert_eq!(stats, RunStats::default());
        assert!(!output.contains("olá"));
        assert_eq!(session.weights().unwrap().get("你好 (nǐ hǎo)"), Some(1.0));
    }

    #[test]
    fn test_end_of_input_during_verdict_records_nothing() {
        let mut session = session_at(PartitionKey::new("HSK1", StudyMode::Qna));

        let (stats, output) = run(&mut session, "\n", None);

        assert_eq!(stats.rounds, 0);
        assert!(output.contains("Vou bem."));
        assert_eq!(session.weights().unwrap().get("q1"), Some(1.0));
    }

    #[test]
    fn test_invalid_verdict_is_reprompted() {
        let mut session = session_at(PartitionKey::new("HSK1", StudyMode::Qna));

        let (stats, output) = run(&mut session, "\nmaybe\ny\n", Some(1));

        assert_eq!(stats.successes, 1);
        assert!(output.contains("answer y or n"));
    }

    #[test]
    fn test_switch_mode_mid_round() {
        let mut session = session_at(PartitionKey::new("HSK1", StudyMode::Vocab));

        let (stats, output) = run(&mut session, "m text\n\n", Some(1));

        assert_eq!(stats.rounds, 1);
        assert!(output.contains("HSK1/text"));
        assert_eq!(
            session.active_partition(),
            Some(&PartitionKey::new("HSK1", StudyMode::Text))
        );
        // the abandoned vocab card kept its weight
        let vocab = session
            .weight_store()
            .load(
                &PartitionKey::new("HSK1", StudyMode::Vocab),
                &session.catalog().valid_keys(&PartitionKey::new("HSK1", StudyMode::Vocab)),
            )
            .unwrap();
        assert_eq!(vocab.get("你好 (nǐ hǎo)"), Some(1.0));
    }

    #[test]
    fn test_empty_partition_offers_switch() {
        let mut session = session_at(PartitionKey::new("HSK2", StudyMode::Vocab));

        let (stats, output) = run(&mut session, "m text\nl HSK1\n\n", Some(1));

        assert!(output.contains("Nothing to study in HSK2/vocab."));
        assert!(output.contains("Nothing to study in HSK2/text."));
        assert_eq!(stats.rounds, 1);
        assert_eq!(
            session.active_partition(),
            Some(&PartitionKey::new("HSK1", StudyMode::Text))
        );
    }

    #[test]
    fn test_bad_mode_command_is_reported() {
        let mut session = session_at(PartitionKey::new("HSK1", StudyMode::Text));

        let (_, output) = run(&mut session, "m grammar\nq\n", None);

        assert!(output.contains("grammar"));
    }
}
