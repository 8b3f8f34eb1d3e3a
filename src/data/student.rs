use crate::{error::MappingError, storage::RawRow};
use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: i32,
    pub name: String,
    pub age: i32,
    pub sex: bool,
    pub card_id: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CardCredit {
    pub id: i32,
    pub student_id: i32,
    pub card_number: i64,
    pub expiration: i32,
    pub cvv: i32,
}

/// A student joined with their card, as read back by the join queries.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StudentData {
    pub student: Student,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_credit: Option<CardCredit>,
}

const CARD_COLUMNS: std::ops::Range<usize> = 5..10;

impl Student {
    /// `SELECT * FROM students` order: `(id, name, age, sex, card_id)`.
    pub fn from_by_id_row(row: &RawRow) -> Result<Self, MappingError> {
        row.expect_columns(5)?;
        Ok(Self {
            id: row.scan(0)?,
            name: row.scan(1)?,
            age: row.scan(2)?,
            sex: row.scan(3)?,
            card_id: row.scan(4)?,
        })
    }

    /// Parameterized lookup order: `(id, age, sex, card_id, name)`.
    pub fn from_safe_row(row: &RawRow) -> Result<Self, MappingError> {
        row.expect_columns(5)?;
        Ok(Self {
            id: row.scan(0)?,
            age: row.scan(1)?,
            sex: row.scan(2)?,
            card_id: row.scan(3)?,
            name: row.scan(4)?,
        })
    }
}

impl StudentData {
    /// `(id, age, sex, card_id, name, student_id, id, card_number, expiration, cvv)`.
    ///
    /// A row whose card columns are all NULL (an outer join miss) has no card;
    /// partially NULL card columns are a mapping error.
    pub fn from_joined_row(row: &RawRow) -> Result<Self, MappingError> {
        row.expect_columns(10)?;
        let student = Student {
            id: row.scan(0)?,
            age: row.scan(1)?,
            sex: row.scan(2)?,
            card_id: row.scan(3)?,
            name: row.scan(4)?,
        };

        let card_credit = if CARD_COLUMNS.clone().all(|i| row.is_null(i)) {
            None
        } else {
            Some(CardCredit {
                student_id: row.scan(5)?,
                id: row.scan(6)?,
                card_number: row.scan(7)?,
                expiration: row.scan(8)?,
                cvv: row.scan(9)?,
            })
        };

        Ok(Self {
            student,
            card_credit,
        })
    }
}
