//! Instruction policies for the five assessment types. The prompt builder
//! composes these fields instead of hard-coding per-type text, so tuning a
//! policy never touches the generation code.

/// How the examiner should pitch items for one assessment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentPolicy {
    /// zh-TW label shown on keyboards and summaries.
    pub label: &'static str,
    /// One-line purpose description shown while configuring.
    pub description: &'static str,
    /// Target difficulty band.
    pub difficulty_band: &'static str,
    /// Target cognitive depth (Webb's DOK).
    pub cognitive_target: &'static str,
    /// How distractors should be designed.
    pub distractor_guidance: &'static str,
}

pub const PLACEMENT: AssessmentPolicy = AssessmentPolicy {
    label: "安置性評量",
    description: "在教學前了解學生的起點行為與基礎能力，作為分組與教學起點的依據。",
    difficulty_band: "易 (Easy) 至 中偏易",
    cognitive_target: "DOK Level 1 (回憶與再認)",
    distractor_guidance: "選項單純直接，目標是確認學生是否具備「門檻能力」，避免過度誘答。",
};

pub const DIAGNOSTIC: AssessmentPolicy = AssessmentPolicy {
    label: "診斷性評量",
    description: "找出學生學習困難的成因與迷思概念，提供補救教學的參考。",
    difficulty_band: "中 (Medium)",
    cognitive_target: "DOK Level 2 (概念與程序應用)",
    distractor_guidance: "重點在於鑑別度：每個誘答選項都必須對應一種常見迷思概念，具備強誘答力 (High Distractor Power)。",
};

pub const FORMATIVE: AssessmentPolicy = AssessmentPolicy {
    label: "形成性評量",
    description: "在教學過程中提供連續回饋，幫助師生掌握學習成敗的原因。",
    difficulty_band: "中偏難 (Medium-Hard)，符合 Desirable Difficulty 理論",
    cognitive_target: "DOK Level 2-3 (應用與策略思考)",
    distractor_guidance: "誘答選項反映解題過程中常見的中間錯誤，解析需提供鷹架式的引導。",
};

pub const SUMMATIVE: AssessmentPolicy = AssessmentPolicy {
    label: "總結性評量",
    description: "在教學告一段落時，評定學習成就與教學目標的達成程度。",
    difficulty_band: "混合分佈 (Mixed)：易、中、難皆須出現",
    cognitive_target: "DOK Level 1-4 (由回憶到延伸思考)",
    distractor_guidance: "誘答選項涵蓋不同層次的錯誤類型，檢驗精熟與遷移程度。",
};

pub const COMPETENCY: AssessmentPolicy = AssessmentPolicy {
    label: "素養導向評量",
    description: "以真實生活情境命題，評量學生將知識轉化為解決問題能力的程度。",
    difficulty_band: "中偏難 (Medium-Hard)，題幹必須情境化",
    cognitive_target: "DOK Level 3-4 (策略思考與延伸應用)",
    distractor_guidance: "題幹先建立生活情境脈絡，誘答選項對應情境誤讀與概念誤用。",
};

#[cfg(test)]
mod tests {
    use crate::quiz::AssessmentType;

    #[test]
    fn labels_are_unique() {
        let labels: Vec<&str> = AssessmentType::ALL
            .iter()
            .map(|assess| assess.policy().label)
            .collect();
        for (i, label) in labels.iter().enumerate() {
            assert!(!labels[i + 1..].contains(label), "duplicate label {label}");
        }
    }

    #[test]
    fn every_policy_field_is_filled() {
        for assess in AssessmentType::ALL {
            let policy = assess.policy();
            assert!(!policy.label.is_empty());
            assert!(!policy.description.is_empty());
            assert!(!policy.difficulty_band.is_empty());
            assert!(!policy.cognitive_target.is_empty());
            assert!(!policy.distractor_guidance.is_empty());
        }
    }
}
