//! Narration script assembly.
//!
//! Turns a [`NewsRecord`] into the raw podcast script. Assembly is pure: the
//! same record and date label always produce byte-identical text.
//!
//! # Structure
//!
//! Sections appear in this order, separated by exactly one blank line. Sections
//! without content are left out entirely.
//!
//! 1. Opening line naming the show and the date
//! 2. Topics, each introduced by a positional transition phrase
//! 3. Chitchat aside
//! 4. Suggested-read aside
//! 5. Closing line

use crate::models::{Aside, NewsRecord, Topic};

pub const SHOW_NAME: &str = "Arweave Today";

const CHITCHAT_DEFAULT_NATURE: &str = "Did you know?";
const SUGGESTED_DEFAULT_NATURE: &str = "today's read";

/// Assemble the raw narration script for `record`, dated with `date_str`.
pub fn assemble(record: &NewsRecord, date_str: &str) -> String {
    let mut sections = vec![opening(date_str)];

    if !record.topics.is_empty() {
        sections.push(format_topics(&record.topics));
    }
    if let Some(chitchat) = record.chitchat.as_ref().and_then(format_chitchat) {
        sections.push(chitchat);
    }
    if let Some(suggested) = record.suggested.as_ref().and_then(format_suggested) {
        sections.push(suggested);
    }
    sections.push(closing());

    sections.join("\n\n")
}

pub fn opening(date_str: &str) -> String {
    format!(
        "Welcome to {SHOW_NAME} for {date_str}. Here are the latest updates from across the arweave ecosystem."
    )
}

pub fn closing() -> String {
    format!("That's all for {SHOW_NAME}. Thanks for listening.")
}

/// Render topics in order with positional transitions.
///
/// The first topic always opens with "First up", so a single-topic record
/// never reaches "And finally".
pub fn format_topics(topics: &[Topic]) -> String {
    let n = topics.len();
    topics
        .iter()
        .enumerate()
        .map(|(idx, topic)| {
            let i = idx + 1;
            let nature = topic.nature.to_lowercase();
            if i == 1 {
                format!("First up, in {nature} news: {}", topic.body)
            } else if i == n {
                format!("And finally, in {nature} news: {}", topic.body)
            } else {
                format!("Moving to {nature} news: {}", topic.body)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `"{nature} {headline}. {body}"`, or `None` when there is nothing to say.
pub fn format_chitchat(aside: &Aside) -> Option<String> {
    let nature = aside.nature.as_deref().unwrap_or(CHITCHAT_DEFAULT_NATURE);
    match (aside.headline.as_deref(), aside.body.as_deref()) {
        (Some(headline), Some(body)) => Some(format!("{nature} {headline}. {body}")),
        (Some(headline), None) => Some(format!("{nature} {headline}.")),
        (None, Some(body)) => Some(format!("{nature} {body}")),
        (None, None) => None,
    }
}

/// `"For {nature}, we recommend checking out '{headline}'. {body}"`, or `None`
/// when there is nothing to recommend.
pub fn format_suggested(aside: &Aside) -> Option<String> {
    let nature = aside.nature.as_deref().unwrap_or(SUGGESTED_DEFAULT_NATURE);
    let intro = format!("For {nature}, we recommend checking out");
    match (aside.headline.as_deref(), aside.body.as_deref()) {
        (Some(headline), Some(body)) => Some(format!("{intro} '{headline}'. {body}")),
        (Some(headline), None) => Some(format!("{intro} '{headline}'.")),
        (None, Some(body)) => Some(format!("{intro}: {body}")),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(nature: &str, body: &str) -> Topic {
        Topic {
            headline: format!("{nature} headline"),
            body: body.to_string(),
            nature: nature.to_string(),
            video: None,
        }
    }

    fn record(topics: Vec<Topic>) -> NewsRecord {
        NewsRecord {
            ts: 1_720_000_000_000,
            topics,
            chitchat: None,
            suggested: None,
        }
    }

    #[test]
    fn test_three_topic_transitions() {
        let rec = record(vec![
            topic("funding", "Grant awarded."),
            topic("Community", "Meetup announced."),
            topic("tech", "Release shipped."),
        ]);
        let script = assemble(&rec, "July 03, 2024");

        let first = script.find("First up, in funding news: Grant awarded.").unwrap();
        let middle = script.find("Moving to community news: Meetup announced.").unwrap();
        let last = script.find("And finally, in tech news: Release shipped.").unwrap();
        assert!(first < middle && middle < last);
    }

    // A lone topic takes the "First up" phrasing; "And finally" never fires.
    #[test]
    fn test_single_topic_is_first_not_final() {
        let script = assemble(&record(vec![topic("news", "B")]), "July 03, 2024");
        assert!(script.contains("First up, in news news: B"));
        assert!(!script.contains("And finally"));
    }

    #[test]
    fn test_end_to_end_shape() {
        let rec = NewsRecord::from_json_str(
            r#"{"ts": 1720000000000, "topics":[{"headline":"H","body":"B","nature":"news"}]}"#,
        )
        .unwrap();
        let script = assemble(&rec, "July 03, 2024");

        assert!(script.starts_with("Welcome to Arweave Today for July 03, 2024."));
        assert!(script.contains("First up, in news news: B"));
        assert!(script.ends_with("That's all for Arweave Today. Thanks for listening."));
        assert_eq!(
            script,
            "Welcome to Arweave Today for July 03, 2024. Here are the latest updates from across the arweave ecosystem.\n\n\
             First up, in news news: B\n\n\
             That's all for Arweave Today. Thanks for listening."
        );
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let mut rec = record(vec![topic("funding", "A"), topic("tech", "B")]);
        rec.chitchat = Some(Aside {
            nature: None,
            headline: Some("Blocks".to_string()),
            body: Some("They are permanent".to_string()),
        });
        assert_eq!(assemble(&rec, "July 03, 2024"), assemble(&rec, "July 03, 2024"));
    }

    #[test]
    fn test_empty_asides_leave_no_gaps() {
        let mut rec = record(vec![topic("news", "B")]);
        rec.chitchat = Some(Aside {
            nature: Some("Did you know?".to_string()),
            headline: None,
            body: None,
        });
        rec.suggested = Some(Aside::default());
        let script = assemble(&rec, "July 03, 2024");

        assert!(!script.contains("Did you know?"));
        assert!(!script.contains("recommend"));
        assert!(!script.contains("\n\n\n"));
        assert_eq!(script.matches("\n\n").count(), 2);
    }

    #[test]
    fn test_no_topics_section_omitted() {
        let script = assemble(&record(vec![]), "July 03, 2024");
        assert_eq!(script, format!("{}\n\n{}", opening("July 03, 2024"), closing()));
    }

    #[test]
    fn test_aside_sections_in_order() {
        let mut rec = record(vec![topic("news", "B")]);
        rec.chitchat = Some(Aside {
            nature: None,
            headline: Some("Arweave stores data forever".to_string()),
            body: Some("Pay once, store forever.".to_string()),
        });
        rec.suggested = Some(Aside {
            nature: None,
            headline: Some("The Permaweb Book".to_string()),
            body: Some("A great primer.".to_string()),
        });
        let script = assemble(&rec, "July 03, 2024");

        let chitchat = script
            .find("Did you know? Arweave stores data forever. Pay once, store forever.")
            .unwrap();
        let suggested = script
            .find("For today's read, we recommend checking out 'The Permaweb Book'. A great primer.")
            .unwrap();
        assert!(chitchat < suggested);
        assert!(suggested < script.find("That's all for").unwrap());
    }

    #[test]
    fn test_aside_partial_content() {
        let headline_only = Aside {
            nature: Some("Fun fact:".to_string()),
            headline: Some("Blocks".to_string()),
            body: None,
        };
        assert_eq!(format_chitchat(&headline_only).unwrap(), "Fun fact: Blocks.");

        let body_only = Aside {
            nature: Some("the weekend".to_string()),
            headline: None,
            body: Some("Read the docs.".to_string()),
        };
        assert_eq!(
            format_suggested(&body_only).unwrap(),
            "For the weekend, we recommend checking out: Read the docs."
        );
    }
}
