//! Built-in anchor phrases, three independently worded sets per dimension.

use super::{Dimension, RatingScale, ReferenceSet};

const INTEREST: [[&str; 5]; 3] = [
    [
        "Not interested at all",
        "Slightly interested",
        "Moderately interested",
        "Very interested",
        "Extremely interested",
    ],
    [
        "This does nothing for me",
        "It has a little appeal but I doubt I would look further",
        "It seems reasonable and I might look into it",
        "I really like this and want to learn more",
        "I love this and want it as soon as possible",
    ],
    [
        "I would ignore this product completely",
        "I am mostly indifferent to this product",
        "I am somewhat curious about this product",
        "I am genuinely excited about this product",
        "I am thrilled about this product, it is exactly what I need",
    ],
];

const PURCHASE_INTENT: [[&str; 5]; 3] = [
    [
        "Definitely would not buy",
        "Probably would not buy",
        "Might or might not buy",
        "Probably would buy",
        "Definitely would buy",
    ],
    [
        "I would never pay for this",
        "It is unlikely I would spend money on this",
        "I would consider paying for it depending on the price",
        "I would likely purchase this",
        "I would purchase this right away",
    ],
    [
        "There is no chance I would get this",
        "I doubt I would get this",
        "I am on the fence about getting this",
        "I will probably get this",
        "I am certain I would get this",
    ],
];

const DISAPPOINTMENT: [[&str; 5]; 3] = [
    [
        "Wouldn't care at all",
        "Slightly disappointed",
        "Moderately disappointed",
        "Very disappointed",
        "Would be devastated",
    ],
    [
        "If it disappeared I would not notice",
        "Losing it would be a minor inconvenience",
        "I would miss it somewhat",
        "Losing it would really upset me",
        "I could not go back to life without it",
    ],
    [
        "Its absence would make no difference to me",
        "I would easily find something else",
        "I would be a bit let down",
        "I would be quite unhappy without it",
        "I would be heartbroken if it went away",
    ],
];

const RECOMMENDATION: [[&str; 5]; 3] = [
    [
        "Definitely would not recommend",
        "Probably would not recommend",
        "Might recommend",
        "Probably would recommend",
        "Absolutely would recommend",
    ],
    [
        "I would warn people away from this",
        "I would not bring this up to anyone",
        "I might mention it if someone asked",
        "I would suggest it to friends",
        "I would tell everyone I know about it",
    ],
    [
        "I would advise against it",
        "I would hesitate to suggest it",
        "I would be neutral if asked about it",
        "I would speak well of it",
        "I would enthusiastically promote it",
    ],
];

/// Built-in scale for one dimension
pub fn default_scale(dimension: Dimension) -> RatingScale {
    let table = match dimension {
        Dimension::Interest => &INTEREST,
        Dimension::PurchaseIntent => &PURCHASE_INTENT,
        Dimension::Disappointment => &DISAPPOINTMENT,
        Dimension::Recommendation => &RECOMMENDATION,
    };
    RatingScale {
        dimension,
        sets: table.iter().map(|phrases| ReferenceSet::new(*phrases)).collect(),
    }
}

/// Built-in scales for every dimension, in `Dimension::ALL` order
pub fn default_scales() -> Vec<RatingScale> {
    Dimension::ALL.into_iter().map(default_scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ssr::REFERENCE_SETS;
    use std::collections::HashSet;

    #[test]
    fn test_every_dimension_has_three_distinct_sets() {
        for scale in default_scales() {
            assert_eq!(scale.sets.len(), REFERENCE_SETS, "{}", scale.dimension);
            let phrases: HashSet<&String> =
                scale.sets.iter().flat_map(|s| s.phrases.iter()).collect();
            assert_eq!(phrases.len(), REFERENCE_SETS * 5, "{}", scale.dimension);
        }
    }

    #[test]
    fn test_scales_follow_dimension_order() {
        let dims: Vec<Dimension> = default_scales().iter().map(|s| s.dimension).collect();
        assert_eq!(dims, Dimension::ALL.to_vec());
    }
}
