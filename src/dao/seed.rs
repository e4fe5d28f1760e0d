use tracing::info;
use uuid::Uuid;

use crate::dao::{
    datastore::{Datastore, DatastoreError},
    models::{Difficulty, QuestionEntity},
};

struct SeedQuestion {
    question: &'static str,
    options: [&'static str; 4],
    correct_answer: u8,
    difficulty: Difficulty,
    topic: &'static str,
    explanation: &'static str,
}

macro_rules! q {
    ($topic:literal, $difficulty:ident, $question:literal, [$($option:literal),+], $correct:literal, $explanation:literal) => {
        SeedQuestion {
            question: $question,
            options: [$($option),+],
            correct_answer: $correct,
            difficulty: Difficulty::$difficulty,
            topic: $topic,
            explanation: $explanation,
        }
    };
}

const BANK: &[SeedQuestion] = &[
    q!("addition", Easy,
        "Lucy has 27 apples and her friend gives her 18 more. How many apples does Lucy have now?",
        ["35", "45", "40", "50"], 1, "27 + 18 = 45. So Lucy has 45 apples now."),
    q!("addition", Easy, "What is 124 + 76?",
        ["190", "200", "210", "180"], 1, "124 + 76 = 200. Adding the units gives 10, carry 1 and finish with 200."),
    q!("addition", Easy,
        "James has $150 and earns $75 more from his weekend job. How much money does he have now?",
        ["200", "225", "215", "230"], 1, "150 + 75 = 225. Total money is $225."),
    q!("addition", Easy, "What is 48 + 36?",
        ["84", "74", "86", "82"], 0, "48 + 36 = 84. 40 + 30 = 70 and 8 + 6 = 14, so 70 + 14 = 84."),
    q!("addition", Easy, "A class has 19 boys and 23 girls. How many students are in the class?",
        ["41", "43", "42", "32"], 2, "19 + 23 = 42 students."),
    q!("addition", Easy, "What is 205 + 95?",
        ["290", "310", "295", "300"], 3, "205 + 95 = 300. 95 is 5 short of 100, and 205 has 5 to spare."),
    q!("addition", Medium, "Solve: 385 + 127 = ?",
        ["512", "502", "510", "517"], 0, "385 + 127 = 512. Break it down: 385 + 100 = 485, then 485 + 27 = 512."),
    q!("addition", Medium, "What is the sum of 783 and 219?",
        ["1001", "1002", "1003", "1004"], 1, "783 + 219 = 1002."),
    q!("addition", Medium,
        "Emma reads 235 pages on Monday, 198 pages on Tuesday, and 167 pages on Wednesday. How many pages did she read in total?",
        ["600", "590", "610", "630"], 0, "First add 235 + 198 = 433, then 433 + 167 = 600."),
    q!("addition", Medium, "What is 456 + 378?",
        ["824", "834", "844", "836"], 1, "456 + 378 = 834. 456 + 300 = 756, then 756 + 78 = 834."),
    q!("addition", Medium,
        "A shop sold 312 pens on Monday and 489 pens on Tuesday. How many pens did it sell?",
        ["791", "811", "801", "800"], 2, "312 + 489 = 801 pens."),
    q!("addition", Medium, "What is 647 + 256?",
        ["893", "913", "902", "903"], 3, "647 + 256 = 903. 647 + 250 = 897, then 897 + 6 = 903."),
    q!("addition", Hard, "Add: 3,456 + 2,789",
        ["6,245", "6,243", "6,255", "6,135"], 0, "3,456 + 2,789 = 6,245. Align by place value for accurate addition."),
    q!("addition", Hard,
        "A box contains 1,254 red balls, 2,347 blue balls, and 1,678 green balls. How many balls are there in total?",
        ["5,179", "5,279", "5,289", "5,189"], 1, "1,254 + 2,347 = 3,601, then 3,601 + 1,678 = 5,279."),
    q!("addition", Hard,
        "If a video game costs $1,259 and another one costs $2,985, how much do both cost together?",
        ["4,244", "4,234", "4,249", "4,239"], 0, "1,259 + 2,985 = 4,244."),
    q!("addition", Hard, "Find the total of 6,789 + 3,212 + 5,404.",
        ["15,405", "15,406", "15,395", "15,403"], 0, "6,789 + 3,212 = 10,001, then 10,001 + 5,404 = 15,405."),
    q!("addition", Hard, "What is 8,675 + 4,938?",
        ["13,513", "13,613", "13,603", "12,613"], 1, "8,675 + 4,938 = 13,613."),
    q!("addition", Hard,
        "A library has 12,480 books and receives 3,765 more. How many books does it have now?",
        ["15,245", "16,145", "16,245", "16,345"], 2, "12,480 + 3,765 = 16,245."),
    q!("subtraction", Easy, "What is 45 - 17?",
        ["28", "32", "27", "38"], 0, "45 - 17 = 28. 45 - 20 = 25, then add back 3."),
    q!("subtraction", Easy, "Tom had 60 stickers and gave away 24. How many are left?",
        ["34", "36", "44", "26"], 1, "60 - 24 = 36 stickers."),
    q!("subtraction", Easy, "What is 100 - 37?",
        ["73", "67", "63", "53"], 2, "100 - 37 = 63."),
    q!("subtraction", Easy, "What is 82 - 29?",
        ["63", "51", "57", "53"], 3, "82 - 29 = 53. 82 - 30 = 52, then add back 1."),
    q!("subtraction", Easy, "A bus has 50 seats and 18 are taken. How many seats are free?",
        ["32", "42", "28", "38"], 0, "50 - 18 = 32 free seats."),
    q!("subtraction", Medium, "What is 532 - 278?",
        ["264", "254", "246", "354"], 1, "532 - 278 = 254."),
    q!("subtraction", Medium, "What is 1,000 - 456?",
        ["554", "644", "544", "456"], 2, "1,000 - 456 = 544."),
    q!("subtraction", Medium, "A farmer had 825 eggs and sold 389. How many eggs are left?",
        ["446", "436", "536", "426"], 1, "825 - 389 = 436 eggs."),
    q!("subtraction", Medium, "What is 703 - 245?",
        ["458", "468", "542", "448"], 0, "703 - 245 = 458."),
    q!("subtraction", Medium, "What is 914 - 587?",
        ["337", "427", "317", "327"], 3, "914 - 587 = 327."),
    q!("subtraction", Hard, "What is 8,004 - 3,769?",
        ["4,235", "4,335", "4,245", "5,235"], 0, "8,004 - 3,769 = 4,235. Borrow across the zeros carefully."),
    q!("subtraction", Hard, "What is 12,500 - 7,836?",
        ["4,764", "4,664", "5,664", "4,674"], 1, "12,500 - 7,836 = 4,664."),
    q!("subtraction", Hard,
        "A city had 45,210 residents and 8,975 moved away. How many residents remain?",
        ["36,335", "37,235", "36,235", "36,245"], 2, "45,210 - 8,975 = 36,235."),
    q!("subtraction", Hard, "What is 10,000 - 6,482?",
        ["3,628", "3,528", "4,518", "3,518"], 3, "10,000 - 6,482 = 3,518."),
    q!("subtraction", Hard, "What is 9,321 - 4,875?",
        ["4,446", "4,546", "5,446", "4,456"], 0, "9,321 - 4,875 = 4,446."),
    q!("multiplication", Easy, "What is 7 × 8?",
        ["54", "56", "48", "64"], 1, "7 × 8 = 56."),
    q!("multiplication", Easy, "What is 6 × 9?",
        ["54", "56", "45", "63"], 0, "6 × 9 = 54."),
    q!("multiplication", Easy, "A box holds 4 rows of 6 eggs. How many eggs are in the box?",
        ["20", "28", "24", "30"], 2, "4 × 6 = 24 eggs."),
    q!("multiplication", Easy, "What is 12 × 5?",
        ["50", "65", "55", "60"], 3, "12 × 5 = 60."),
    q!("multiplication", Easy, "What is 9 × 3?",
        ["27", "24", "21", "36"], 0, "9 × 3 = 27."),
    q!("multiplication", Medium, "What is 23 × 14?",
        ["312", "322", "332", "292"], 1, "23 × 14 = 230 + 92 = 322."),
    q!("multiplication", Medium, "What is 45 × 12?",
        ["540", "450", "560", "530"], 0, "45 × 12 = 450 + 90 = 540."),
    q!("multiplication", Medium,
        "A theatre has 18 rows of 25 seats. How many seats are there?",
        ["400", "425", "450", "475"], 2, "18 × 25 = 450 seats."),
    q!("multiplication", Medium, "What is 37 × 6?",
        ["212", "232", "242", "222"], 3, "37 × 6 = 180 + 42 = 222."),
    q!("multiplication", Medium, "What is 16 × 16?",
        ["246", "256", "266", "236"], 1, "16 × 16 = 256."),
    q!("multiplication", Hard, "What is 124 × 36?",
        ["4,464", "4,364", "4,564", "4,454"], 0, "124 × 36 = 3,720 + 744 = 4,464."),
    q!("multiplication", Hard, "What is 305 × 48?",
        ["14,540", "14,640", "15,640", "14,650"], 1, "305 × 48 = 12,200 + 2,440 = 14,640."),
    q!("multiplication", Hard,
        "A factory makes 1,250 parts per day. How many parts does it make in 28 days?",
        ["34,000", "35,500", "35,000", "30,000"], 2, "1,250 × 28 = 35,000 parts."),
    q!("multiplication", Hard, "What is 89 × 76?",
        ["6,664", "6,754", "6,864", "6,764"], 3, "89 × 76 = 6,840 - 76 = 6,764."),
    q!("multiplication", Hard, "What is 217 × 43?",
        ["9,331", "9,231", "9,321", "8,331"], 0, "217 × 43 = 8,680 + 651 = 9,331."),
];

/// Fresh question rows for the built-in bank.
pub fn question_bank() -> Vec<QuestionEntity> {
    BANK.iter()
        .map(|seed| QuestionEntity {
            id: Uuid::new_v4(),
            question: seed.question.to_owned(),
            options: seed.options.iter().map(|option| (*option).to_owned()).collect(),
            correct_answer: seed.correct_answer,
            difficulty: seed.difficulty,
            topic: seed.topic.to_owned(),
            explanation: seed.explanation.to_owned(),
        })
        .collect()
}

/// Insert the built-in bank when the question table is empty.
///
/// Returns the number of inserted questions.
pub async fn seed_question_bank(datastore: &Datastore) -> Result<usize, DatastoreError> {
    let inserted = datastore
        .transact(|tx| {
            if !tx.tables().questions.is_empty() {
                return Ok(0);
            }
            let bank = question_bank();
            let count = bank.len();
            for question in bank {
                tx.put(question)?;
            }
            Ok::<_, DatastoreError>(count)
        })
        .await?;

    if inserted > 0 {
        info!(inserted, "seeded question bank");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn every_seeded_question_is_well_formed() {
        for question in question_bank() {
            assert_eq!(question.options.len(), 4, "{}", question.question);
            assert!(question.correct_answer < 4, "{}", question.question);
        }
    }

    #[test]
    fn every_pool_can_fill_a_five_question_game() {
        let mut pools: HashMap<(String, Difficulty), usize> = HashMap::new();
        for question in question_bank() {
            *pools.entry((question.topic, question.difficulty)).or_default() += 1;
        }

        assert_eq!(pools.len(), 9);
        assert!(pools.values().all(|size| *size >= 5));
    }

    #[tokio::test]
    async fn seeding_only_fills_an_empty_table() {
        let (datastore, _journal) = Datastore::new();

        let first = seed_question_bank(&datastore).await.unwrap();
        let second = seed_question_bank(&datastore).await.unwrap();

        assert_eq!(first, BANK.len());
        assert_eq!(second, 0);
        datastore
            .read(|tables| assert_eq!(tables.questions.len(), BANK.len()))
            .await;
    }
}
