//! ReQL Term Types.
//!
//! Every query operation the driver can emit, with discriminants equal to
//! the numeric ids of the JSON wire protocol so a `TermType` can be written
//! straight onto the wire.
//!
//! # Term Categories
//!
//! - **Core Data**: DATUM, MAKE_ARRAY, MAKE_OBJ, VAR, FUNC
//! - **Data Access**: DB, TABLE, GET, GET_ALL, BETWEEN
//! - **Transformations**: FILTER, MAP, CONCAT_MAP, ORDER_BY, DISTINCT
//! - **Aggregations**: COUNT, SUM, AVG, MIN, MAX, GROUP, REDUCE
//! - **Math / Logic**: ADD ... MOD, EQ ... GE, AND, OR, NOT
//! - **Strings**: MATCH, SPLIT, UPCASE, DOWNCASE
//! - **Time**: NOW, TIME, EPOCH_TIME, YEAR ... SECONDS
//!
//! # Example
//!
//! ```rust
//! use reql_core::reql::TermType;
//!
//! let term_type = TermType::from_u64(38).unwrap();
//! assert_eq!(term_type, TermType::Map);
//! assert_eq!(term_type.name(), "MAP");
//! ```

use serde::{Deserialize, Serialize};

macro_rules! term_types {
    ($($variant:ident = $id:literal => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u64)]
        pub enum TermType {
            $($variant = $id,)*
        }

        impl TermType {
            /// Converts from a wire term id; `None` for ids this driver never emits.
            pub fn from_u64(value: u64) -> Option<Self> {
                match value {
                    $($id => Some(TermType::$variant),)*
                    _ => None,
                }
            }

            /// Uppercase protocol name, e.g. `"GET_FIELD"`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(TermType::$variant => $name,)*
                }
            }
        }
    };
}

term_types! {
    Datum = 1 => "DATUM",
    MakeArray = 2 => "MAKE_ARRAY",
    MakeObj = 3 => "MAKE_OBJ",
    Var = 10 => "VAR",
    Javascript = 11 => "JAVASCRIPT",
    Error = 12 => "ERROR",
    ImplicitVar = 13 => "IMPLICIT_VAR",
    Db = 14 => "DB",
    Table = 15 => "TABLE",
    Get = 16 => "GET",
    Eq = 17 => "EQ",
    Ne = 18 => "NE",
    Lt = 19 => "LT",
    Le = 20 => "LE",
    Gt = 21 => "GT",
    Ge = 22 => "GE",
    Not = 23 => "NOT",
    Add = 24 => "ADD",
    Sub = 25 => "SUB",
    Mul = 26 => "MUL",
    Div = 27 => "DIV",
    Mod = 28 => "MOD",
    Append = 29 => "APPEND",
    Slice = 30 => "SLICE",
    GetField = 31 => "GET_FIELD",
    HasFields = 32 => "HAS_FIELDS",
    Pluck = 33 => "PLUCK",
    Without = 34 => "WITHOUT",
    Merge = 35 => "MERGE",
    Reduce = 37 => "REDUCE",
    Map = 38 => "MAP",
    Filter = 39 => "FILTER",
    ConcatMap = 40 => "CONCAT_MAP",
    OrderBy = 41 => "ORDER_BY",
    Distinct = 42 => "DISTINCT",
    Count = 43 => "COUNT",
    Union = 44 => "UNION",
    Nth = 45 => "NTH",
    InnerJoin = 48 => "INNER_JOIN",
    OuterJoin = 49 => "OUTER_JOIN",
    EqJoin = 50 => "EQ_JOIN",
    CoerceTo = 51 => "COERCE_TO",
    TypeOf = 52 => "TYPE_OF",
    Update = 53 => "UPDATE",
    Delete = 54 => "DELETE",
    Replace = 55 => "REPLACE",
    Insert = 56 => "INSERT",
    DbCreate = 57 => "DB_CREATE",
    DbDrop = 58 => "DB_DROP",
    DbList = 59 => "DB_LIST",
    TableCreate = 60 => "TABLE_CREATE",
    TableDrop = 61 => "TABLE_DROP",
    TableList = 62 => "TABLE_LIST",
    Funcall = 64 => "FUNCALL",
    Branch = 65 => "BRANCH",
    Or = 66 => "OR",
    And = 67 => "AND",
    ForEach = 68 => "FOR_EACH",
    Func = 69 => "FUNC",
    Skip = 70 => "SKIP",
    Limit = 71 => "LIMIT",
    Zip = 72 => "ZIP",
    Asc = 73 => "ASC",
    Desc = 74 => "DESC",
    GetAll = 78 => "GET_ALL",
    Prepend = 80 => "PREPEND",
    InsertAt = 82 => "INSERT_AT",
    DeleteAt = 83 => "DELETE_AT",
    ChangeAt = 84 => "CHANGE_AT",
    SpliceAt = 85 => "SPLICE_AT",
    IsEmpty = 86 => "IS_EMPTY",
    SetInsert = 88 => "SET_INSERT",
    SetIntersection = 89 => "SET_INTERSECTION",
    SetUnion = 90 => "SET_UNION",
    SetDifference = 91 => "SET_DIFFERENCE",
    Default = 92 => "DEFAULT",
    Contains = 93 => "CONTAINS",
    Keys = 94 => "KEYS",
    Difference = 95 => "DIFFERENCE",
    Match = 97 => "MATCH",
    Iso8601 = 99 => "ISO8601",
    ToIso8601 = 100 => "TO_ISO8601",
    EpochTime = 101 => "EPOCH_TIME",
    ToEpochTime = 102 => "TO_EPOCH_TIME",
    Now = 103 => "NOW",
    InTimezone = 104 => "IN_TIMEZONE",
    During = 105 => "DURING",
    Date = 106 => "DATE",
    TimeOfDay = 126 => "TIME_OF_DAY",
    Timezone = 127 => "TIMEZONE",
    Year = 128 => "YEAR",
    Month = 129 => "MONTH",
    Day = 130 => "DAY",
    DayOfWeek = 131 => "DAY_OF_WEEK",
    DayOfYear = 132 => "DAY_OF_YEAR",
    Hours = 133 => "HOURS",
    Minutes = 134 => "MINUTES",
    Seconds = 135 => "SECONDS",
    Time = 136 => "TIME",
    Upcase = 141 => "UPCASE",
    Downcase = 142 => "DOWNCASE",
    Group = 144 => "GROUP",
    Sum = 145 => "SUM",
    Avg = 146 => "AVG",
    Min = 147 => "MIN",
    Max = 148 => "MAX",
    Split = 149 => "SPLIT",
    Ungroup = 150 => "UNGROUP",
    Binary = 155 => "BINARY",
    Uuid = 169 => "UUID",
    Bracket = 170 => "BRACKET",
    Between = 182 => "BETWEEN",
    Floor = 183 => "FLOOR",
    Ceil = 184 => "CEIL",
    Round = 185 => "ROUND",
    Values = 186 => "VALUES",
}

impl TermType {
    /// Converts to the numeric wire id.
    ///
    /// ```rust
    /// # use reql_core::reql::TermType;
    /// assert_eq!(TermType::Filter.to_u64(), 39);
    /// ```
    pub fn to_u64(self) -> u64 {
        self as u64
    }
}

impl std::fmt::Display for TermType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_type_conversion() {
        assert_eq!(TermType::from_u64(1), Some(TermType::Datum));
        assert_eq!(TermType::from_u64(2), Some(TermType::MakeArray));
        assert_eq!(TermType::from_u64(17), Some(TermType::Eq));
        assert_eq!(TermType::from_u64(999), None);
    }

    #[test]
    fn test_term_type_to_u64() {
        assert_eq!(TermType::Datum.to_u64(), 1);
        assert_eq!(TermType::Func.to_u64(), 69);
        assert_eq!(TermType::GetField.to_u64(), 31);
    }

    #[test]
    fn test_term_type_names() {
        assert_eq!(TermType::Datum.name(), "DATUM");
        assert_eq!(TermType::DayOfWeek.name(), "DAY_OF_WEEK");
        assert_eq!(TermType::Branch.to_string(), "BRANCH");
    }
}
