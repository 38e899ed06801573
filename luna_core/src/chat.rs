//! Cycle summary for the chat assistant.
//!
//! The assistant itself is an external collaborator behind [`ChatResponder`];
//! this module only builds the text it is given and handles its failures.

use crate::{segmenter, Cycle, CycleStats, DailyLog, Result};
use std::collections::HashMap;
use std::fmt;

pub const NO_LOGS: &str = "No period data available yet.";
pub const NO_CYCLES: &str = "No complete cycles recorded yet.";
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I couldn't process your request at the moment. Please try again later.";

const TOP_PATTERNS: usize = 5;
const RECENT_LOGS: usize = 5;
const HISTORY_MESSAGES: usize = 10;

/// Anything that can answer a question given a prompt
pub trait ChatResponder {
    fn respond(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A value and the share of logs recording it
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub label: String,
    pub percent: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CycleSummary {
    pub average_cycle_length: i64,
    pub average_period_length: i64,
    pub cycle_count: usize,
    pub most_recent_start: chrono::NaiveDate,
}

/// Text-ready digest of a user's history
#[derive(Clone, Debug, PartialEq)]
pub enum ChatContext {
    Empty,
    Data {
        cycles: Option<CycleSummary>,
        /// `None` when no log recorded any symptom
        symptoms: Option<Vec<Pattern>>,
        moods: Option<Vec<Pattern>>,
        recent: Vec<DailyLog>,
    },
}

impl ChatContext {
    /// Summarise `logs` (any order) and the derived `cycles`
    pub fn build(logs: &[DailyLog], cycles: &[Cycle]) -> Self {
        if logs.is_empty() {
            return ChatContext::Empty;
        }

        let mut sorted = logs.to_vec();
        sorted.sort_by_key(|log| log.date);

        let cycles = (!cycles.is_empty()).then(|| {
            let stats = CycleStats::from_cycles(cycles);
            let latest = segmenter::most_recent_first(cycles.to_vec());
            CycleSummary {
                average_cycle_length: stats.rounded_cycle_length(),
                average_period_length: stats.rounded_period_length(),
                cycle_count: cycles.len(),
                most_recent_start: latest[0].start_date,
            }
        });

        let symptoms = patterns(
            sorted
                .iter()
                .filter(|log| !log.symptoms.is_empty())
                .map(|log| log.symptoms.iter().map(String::as_str).collect::<Vec<_>>()),
        );
        let moods = patterns(
            sorted
                .iter()
                .filter_map(|log| log.mood.as_deref())
                .map(|mood| vec![mood]),
        );

        let recent = sorted
            .iter()
            .rev()
            .take(RECENT_LOGS)
            .rev()
            .cloned()
            .collect();

        ChatContext::Data {
            cycles,
            symptoms,
            moods,
            recent,
        }
    }
}

/// Count labels over the logs that recorded any; most frequent first
fn patterns<'a>(entries: impl Iterator<Item = Vec<&'a str>>) -> Option<Vec<Pattern>> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    let mut total = 0u32;
    for labels in entries {
        total += 1;
        for label in labels {
            *counts.entry(label).or_default() += 1;
        }
    }
    if total == 0 {
        return None;
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    Some(
        ranked
            .into_iter()
            .take(TOP_PATTERNS)
            .map(|(label, count)| Pattern {
                label: label.to_string(),
                percent: (f64::from(count) / f64::from(total) * 100.0).round() as u32,
            })
            .collect(),
    )
}

fn write_patterns(
    f: &mut fmt::Formatter<'_>,
    patterns: &Option<Vec<Pattern>>,
    empty: &str,
) -> fmt::Result {
    match patterns {
        Some(patterns) => {
            for p in patterns {
                writeln!(f, "{} ({}% of periods)", p.label, p.percent)?;
            }
            Ok(())
        }
        None => writeln!(f, "{}", empty),
    }
}

impl fmt::Display for ChatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ChatContext::Data {
            cycles,
            symptoms,
            moods,
            recent,
        } = self
        else {
            return f.write_str(NO_LOGS);
        };

        writeln!(f, "CYCLE STATISTICS:")?;
        match cycles {
            Some(c) => {
                writeln!(f, "- Average cycle length: {} days", c.average_cycle_length)?;
                writeln!(f, "- Average period length: {} days", c.average_period_length)?;
                writeln!(f, "- Number of recorded cycles: {}", c.cycle_count)?;
                writeln!(f, "- Most recent cycle started: {}", c.most_recent_start)?;
            }
            None => writeln!(f, "{}", NO_CYCLES)?,
        }

        writeln!(f, "\nSYMPTOM PATTERNS:")?;
        write_patterns(f, symptoms, "No symptom data recorded yet.")?;

        writeln!(f, "\nMOOD PATTERNS:")?;
        write_patterns(f, moods, "No mood data recorded yet.")?;

        writeln!(f, "\nMOST RECENT PERIOD LOGS:")?;
        for log in recent {
            let symptoms = if log.symptoms.is_empty() {
                "None recorded".to_string()
            } else {
                log.symptoms.iter().cloned().collect::<Vec<_>>().join(", ")
            };
            writeln!(
                f,
                "- Date: {}, Flow: {}, Mood: {}, Symptoms: {}",
                log.date,
                log.flow.map(|fl| fl.as_str()).unwrap_or("Not recorded"),
                log.mood.as_deref().unwrap_or("Not recorded"),
                symptoms
            )?;
        }
        Ok(())
    }
}

/// Assemble the prompt handed to the responder
pub fn build_prompt(context: &ChatContext, history: &[ChatMessage], query: &str) -> String {
    let start = history.len().saturating_sub(HISTORY_MESSAGES);
    let history = history[start..]
        .iter()
        .map(|msg| {
            let who = match msg.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{}: {}", who, msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a supportive menstrual health assistant.\n\
         Only use the data below and say so when it is not enough.\n\n\
         USER'S PERIOD DATA CONTEXT:\n{}\n\n\
         RECENT CONVERSATION:\n{}\n\n\
         USER QUERY: {}\n",
        context, history, query
    )
}

/// Ask the responder, replying with [`FALLBACK_REPLY`] if it fails
pub fn ask(
    responder: &dyn ChatResponder,
    context: &ChatContext,
    history: &[ChatMessage],
    query: &str,
) -> String {
    let prompt = build_prompt(context, history, query);
    match responder.respond(&prompt) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("Chat responder failed: {}", e);
            FALLBACK_REPLY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Flow};
    use chrono::{Duration, NaiveDate};
    use std::cell::RefCell;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n - 1)
    }

    fn log(n: i64) -> DailyLog {
        DailyLog::new(day(n)).with_flow(Flow::Medium)
    }

    struct Echo {
        seen: RefCell<String>,
    }

    impl ChatResponder for Echo {
        fn respond(&self, prompt: &str) -> Result<String> {
            *self.seen.borrow_mut() = prompt.to_string();
            Ok("Looks regular.".into())
        }
    }

    struct Offline;

    impl ChatResponder for Offline {
        fn respond(&self, _prompt: &str) -> Result<String> {
            Err(Error::Collaborator("connection refused".into()))
        }
    }

    #[test]
    fn test_empty_history() {
        let context = ChatContext::build(&[], &[]);
        assert_eq!(context, ChatContext::Empty);
        assert_eq!(context.to_string(), NO_LOGS);
    }

    #[test]
    fn test_no_cycles_message() {
        let logs = vec![DailyLog::new(day(1))];
        let text = ChatContext::build(&logs, &[]).to_string();

        assert!(text.contains(NO_CYCLES));
        assert!(text.contains("No symptom data recorded yet."));
        assert!(text.contains("No mood data recorded yet."));
        assert!(text.contains("Flow: Not recorded"));
    }

    #[test]
    fn test_uses_most_recent_cycle() {
        let logs: Vec<_> = [1, 2, 29, 30, 57].into_iter().map(log).collect();
        let cycles = segmenter::segment(&logs);
        let text = ChatContext::build(&logs, &cycles).to_string();

        assert!(text.contains("- Average cycle length: 28 days"));
        assert!(text.contains("- Average period length: 2 days"));
        assert!(text.contains("- Number of recorded cycles: 3"));
        assert!(text.contains(&format!("- Most recent cycle started: {}", day(57))));
    }

    #[test]
    fn test_pattern_percentages() {
        let mut a = log(1);
        a.symptoms = ["cramps", "headache"].iter().map(|s| s.to_string()).collect();
        a.mood = Some("Tired".into());
        let mut b = log(2);
        b.symptoms = ["cramps"].iter().map(|s| s.to_string()).collect();
        b.mood = Some("Tired".into());
        let mut c = log(3);
        c.mood = Some("Calm".into());
        // No symptoms on c, so it does not count towards symptom share
        let ctx = ChatContext::build(&[c, b, a], &[]);

        let ChatContext::Data { symptoms, moods, .. } = &ctx else {
            panic!("expected data");
        };
        let symptoms = symptoms.as_ref().unwrap();
        assert_eq!(symptoms[0], Pattern { label: "cramps".into(), percent: 100 });
        assert_eq!(symptoms[1], Pattern { label: "headache".into(), percent: 50 });

        let moods = moods.as_ref().unwrap();
        assert_eq!(moods[0], Pattern { label: "Tired".into(), percent: 67 });
        assert_eq!(moods[1], Pattern { label: "Calm".into(), percent: 33 });

        assert!(ctx.to_string().contains("cramps (100% of periods)"));
    }

    #[test]
    fn test_top_five_and_recent_five() {
        let logs: Vec<_> = (1..=8)
            .map(|n| {
                let mut l = log(n);
                l.mood = Some(format!("mood{}", n));
                l
            })
            .collect();
        let ctx = ChatContext::build(&logs, &[]);

        let ChatContext::Data { moods, recent, .. } = &ctx else {
            panic!("expected data");
        };
        assert_eq!(moods.as_ref().unwrap().len(), 5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].date, day(4));
        assert_eq!(recent[4].date, day(8));
    }

    #[test]
    fn test_ask_passes_context_and_history() {
        let echo = Echo {
            seen: RefCell::new(String::new()),
        };
        let history: Vec<_> = (0..12)
            .map(|i| ChatMessage {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("message {}", i),
            })
            .collect();

        let reply = ask(&echo, &ChatContext::Empty, &history, "Am I regular?");
        assert_eq!(reply, "Looks regular.");

        let prompt = echo.seen.borrow();
        assert!(prompt.contains(NO_LOGS));
        assert!(prompt.contains("USER QUERY: Am I regular?"));
        assert!(!prompt.contains("message 1\n"));
        assert!(prompt.contains("User: message 2"));
        assert!(prompt.contains("Assistant: message 11"));
    }

    #[test]
    fn test_ask_falls_back_on_failure() {
        let reply = ask(&Offline, &ChatContext::Empty, &[], "hello");
        assert_eq!(reply, FALLBACK_REPLY);
    }
}
