use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CheckinRecord, Tag};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagStats {
    pub tag_percentages: BTreeMap<Tag, f64>,
    pub most_common_tag: Option<Tag>,
}

/// Share of each tag across every check-in's tag set, rounded to one decimal place
/// (half away from zero).
///
/// Ties for the most common tag go to the tag seen first in the history.
pub fn aggregate_tags(checkins: &[CheckinRecord]) -> TagStats {
    // (tag, count) in order of first appearance
    let mut counts: Vec<(Tag, u32)> = Vec::new();
    for tag in checkins.iter().flat_map(|checkin| checkin.tags.iter()) {
        match counts.iter_mut().find(|(seen, _)| seen == tag) {
            Some((_, count)) => *count += 1,
            None => counts.push((*tag, 1)),
        }
    }

    let total: u32 = counts.iter().map(|(_, count)| count).sum();
    if total == 0 {
        return TagStats::default();
    }

    let tag_percentages = counts
        .iter()
        .map(|&(tag, count)| (tag, round_one_decimal(100.0 * count as f64 / total as f64)))
        .collect();

    let most_common_tag = counts
        .iter()
        .fold(None, |best: Option<(Tag, u32)>, &(tag, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((tag, count)),
        })
        .map(|(tag, _)| tag);

    TagStats {
        tag_percentages,
        most_common_tag,
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Actor;
    use chrono::Utc;

    fn checkin(id: i64, tags: &[Tag]) -> CheckinRecord {
        CheckinRecord {
            id,
            location_id: 7,
            actor: Actor::Account(format!("user-{id}")),
            tags: tags.to_vec(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history_has_no_stats() {
        let stats = aggregate_tags(&[]);
        assert!(stats.tag_percentages.is_empty());
        assert_eq!(stats.most_common_tag, None);
    }

    #[test]
    fn untagged_checkins_are_ignored() {
        let stats = aggregate_tags(&[checkin(1, &[]), checkin(2, &[])]);
        assert_eq!(stats, TagStats::default());
    }

    #[test]
    fn even_split_keeps_first_seen_tag() {
        let history = [
            checkin(1, &[Tag::Food]),
            checkin(2, &[Tag::Food, Tag::Nature]),
            checkin(3, &[Tag::Nature]),
        ];
        let stats = aggregate_tags(&history);

        assert_eq!(stats.tag_percentages[&Tag::Food], 50.0);
        assert_eq!(stats.tag_percentages[&Tag::Nature], 50.0);
        assert_eq!(stats.most_common_tag, Some(Tag::Food));
    }

    #[test]
    fn tie_break_follows_history_order_not_vocabulary_order() {
        let history = [checkin(1, &[Tag::Sport]), checkin(2, &[Tag::Culture])];
        assert_eq!(aggregate_tags(&history).most_common_tag, Some(Tag::Sport));
    }

    #[test]
    fn thirds_round_to_one_decimal() {
        let history = [
            checkin(1, &[Tag::Party]),
            checkin(2, &[Tag::Culture]),
            checkin(3, &[Tag::Sport]),
        ];
        let stats = aggregate_tags(&history);

        for tag in [Tag::Party, Tag::Culture, Tag::Sport] {
            assert_eq!(stats.tag_percentages[&tag], 33.3);
        }
        let sum: f64 = stats.tag_percentages.values().sum();
        assert!((sum - 100.0).abs() <= 0.05 * 3.0);
    }

    #[test]
    fn halves_round_away_from_zero() {
        // 1 of 8 = 12.5%, 7 of 8 = 87.5%
        let mut history = vec![checkin(0, &[Tag::Nature])];
        history.extend((1..8).map(|id| checkin(id, &[Tag::Food])));
        let stats = aggregate_tags(&history);

        assert_eq!(stats.tag_percentages[&Tag::Nature], 12.5);
        assert_eq!(stats.tag_percentages[&Tag::Food], 87.5);
        assert_eq!(stats.most_common_tag, Some(Tag::Food));

        assert_eq!(round_one_decimal(0.25), 0.3);
        assert_eq!(round_one_decimal(66.66666), 66.7);
    }

    #[test]
    fn later_majority_beats_earlier_tag() {
        let history = [
            checkin(1, &[Tag::Food]),
            checkin(2, &[Tag::Party]),
            checkin(3, &[Tag::Party, Tag::Food]),
            checkin(4, &[Tag::Party]),
        ];
        let stats = aggregate_tags(&history);

        assert_eq!(stats.most_common_tag, Some(Tag::Party));
        assert_eq!(stats.tag_percentages[&Tag::Party], 60.0);
        assert_eq!(stats.tag_percentages[&Tag::Food], 40.0);
    }
}
