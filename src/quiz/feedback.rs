//! Result-screen feedback. The tier is a pure function of the score; the
//! pick inside a tier's message pool is random for variety only.

use rand::seq::SliceRandom;

/// Shown when an attempt finished with no answer records at all.
pub const NO_RECORDS: &str = "沒有作答紀錄，無法計算成績。";

/// Performance tiers over the correct/total ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Perfect,
    Strong,
    Passing,
    Struggling,
}

const PERFECT_MESSAGES: [&str; 3] = [
    "🌟 太棒了！完全掌握！🎈",
    "🏆 滿分！這個單元對你來說完全不是問題！",
    "🎉 全部答對！學習成果非常紮實！",
];

const STRONG_MESSAGES: [&str; 3] = [
    "✨ 表現優秀！距離完全掌握只差一步！",
    "💪 很厲害！只剩一點小地方需要留意！",
    "🌈 相當不錯！觀念大致都穩固了！",
];

const PASSING_MESSAGES: [&str; 3] = [
    "👍 做得不錯！繼續加油！",
    "🙂 一半以上的題目都答對了，再練習會更好！",
    "📘 基礎已經建立，針對錯題再複習一下吧！",
];

const STRUGGLING_MESSAGES: [&str; 3] = [
    "📖 很好的學習機會！",
    "🌱 別氣餒，從錯題解析開始慢慢補強！",
    "🤝 這個單元還需要多練習，建議和老師討論看看！",
];

impl Tier {
    /// Buckets a finished attempt. `None` when there is nothing to bucket.
    pub fn for_score(correct: usize, total: usize) -> Option<Tier> {
        if total == 0 {
            return None;
        }
        let ratio = correct as f64 / total as f64;
        Some(if correct == total {
            Tier::Perfect
        } else if ratio >= 0.8 {
            Tier::Strong
        } else if ratio >= 0.5 {
            Tier::Passing
        } else {
            Tier::Struggling
        })
    }

    pub fn messages(&self) -> &'static [&'static str] {
        match self {
            Tier::Perfect => &PERFECT_MESSAGES,
            Tier::Strong => &STRONG_MESSAGES,
            Tier::Passing => &PASSING_MESSAGES,
            Tier::Struggling => &STRUGGLING_MESSAGES,
        }
    }
}

/// Headline for the result screen.
pub fn headline(correct: usize, total: usize) -> &'static str {
    match Tier::for_score(correct, total) {
        Some(tier) => {
            let pool = tier.messages();
            pool.choose(&mut rand::thread_rng()).copied().unwrap_or(pool[0])
        }
        None => NO_RECORDS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_question_buckets() {
        assert_eq!(Tier::for_score(5, 5), Some(Tier::Perfect));
        assert_eq!(Tier::for_score(4, 5), Some(Tier::Strong));
        assert_eq!(Tier::for_score(3, 5), Some(Tier::Passing));
        assert_eq!(Tier::for_score(2, 5), Some(Tier::Struggling));
        assert_eq!(Tier::for_score(0, 5), Some(Tier::Struggling));
    }

    #[test]
    fn perfect_requires_every_answer() {
        // 9/10 is 90%, still not the perfect tier.
        assert_eq!(Tier::for_score(9, 10), Some(Tier::Strong));
        assert_eq!(Tier::for_score(10, 10), Some(Tier::Perfect));
        assert_eq!(Tier::for_score(1, 1), Some(Tier::Perfect));
    }

    #[test]
    fn no_records_has_no_tier() {
        assert_eq!(Tier::for_score(0, 0), None);
        assert_eq!(headline(0, 0), NO_RECORDS);
    }

    #[test]
    fn headline_stays_inside_the_tier_pool() {
        for (correct, total) in [(5, 5), (4, 5), (3, 5), (2, 5)] {
            let pool = Tier::for_score(correct, total).unwrap().messages();
            for _ in 0..16 {
                assert!(pool.contains(&headline(correct, total)));
            }
        }
    }
}
