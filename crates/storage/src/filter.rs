use std::{fmt, str::FromStr};

use beaconwatch_types::header::SlotHeader;

/// Header columns that `/data` may filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderColumn {
    Slot,
    Epoch,
    UnixTime,
    Root,
    Canonical,
    ProposerIndex,
    ParentRoot,
    StateRoot,
    BodyRoot,
    Signature,
}

impl HeaderColumn {
    pub const ALL: [HeaderColumn; 10] = [
        HeaderColumn::Slot,
        HeaderColumn::Epoch,
        HeaderColumn::UnixTime,
        HeaderColumn::Root,
        HeaderColumn::Canonical,
        HeaderColumn::ProposerIndex,
        HeaderColumn::ParentRoot,
        HeaderColumn::StateRoot,
        HeaderColumn::BodyRoot,
        HeaderColumn::Signature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderColumn::Slot => "slot",
            HeaderColumn::Epoch => "epoch",
            HeaderColumn::UnixTime => "unix_time",
            HeaderColumn::Root => "root",
            HeaderColumn::Canonical => "canonical",
            HeaderColumn::ProposerIndex => "proposer_index",
            HeaderColumn::ParentRoot => "parent_root",
            HeaderColumn::StateRoot => "state_root",
            HeaderColumn::BodyRoot => "body_root",
            HeaderColumn::Signature => "signature",
        }
    }
}

impl fmt::Display for HeaderColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
    #[error("invalid value {value:?} for column {column}")]
    InvalidValue { column: HeaderColumn, value: String },
}

impl FromStr for HeaderColumn {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HeaderColumn::ALL
            .into_iter()
            .find(|column| column.as_str() == s)
            .ok_or_else(|| FilterError::UnknownColumn(s.to_string()))
    }
}

/// Equality filter over a single header column, with the value already
/// parsed into the column's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderFilter {
    Slot(u64),
    Epoch(u64),
    UnixTime(u64),
    Canonical(bool),
    /// Any of the string-valued columns.
    Text(HeaderColumn, String),
}

impl HeaderFilter {
    pub fn parse(column: &str, value: &str) -> Result<Self, FilterError> {
        let column: HeaderColumn = column.parse()?;
        let invalid = || FilterError::InvalidValue {
            column,
            value: value.to_string(),
        };
        let filter = match column {
            HeaderColumn::Slot => HeaderFilter::Slot(value.parse().map_err(|_| invalid())?),
            HeaderColumn::Epoch => HeaderFilter::Epoch(value.parse().map_err(|_| invalid())?),
            HeaderColumn::UnixTime => {
                HeaderFilter::UnixTime(value.parse().map_err(|_| invalid())?)
            }
            HeaderColumn::Canonical => {
                HeaderFilter::Canonical(value.parse().map_err(|_| invalid())?)
            }
            text_column => HeaderFilter::Text(text_column, value.to_string()),
        };
        Ok(filter)
    }

    pub fn matches(&self, header: &SlotHeader) -> bool {
        match self {
            HeaderFilter::Slot(slot) => header.slot == *slot,
            HeaderFilter::Epoch(epoch) => header.epoch == *epoch,
            HeaderFilter::UnixTime(time) => header.unix_time == *time,
            HeaderFilter::Canonical(canonical) => header.canonical == *canonical,
            HeaderFilter::Text(column, value) => {
                let field = match column {
                    HeaderColumn::Root => &header.root,
                    HeaderColumn::ProposerIndex => &header.proposer_index,
                    HeaderColumn::ParentRoot => &header.parent_root,
                    HeaderColumn::StateRoot => &header.state_root,
                    HeaderColumn::BodyRoot => &header.body_root,
                    HeaderColumn::Signature => &header.signature,
                    // Numeric and boolean columns never produce a `Text` filter.
                    _ => return false,
                };
                field == value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> SlotHeader {
        SlotHeader {
            slot: 100,
            epoch: 3,
            unix_time: 1606825223,
            root: "0xroot".into(),
            canonical: true,
            proposer_index: "42".into(),
            parent_root: "0xparent".into(),
            state_root: "0xstate".into(),
            body_root: "0xbody".into(),
            signature: "0xsig".into(),
        }
    }

    #[test]
    fn every_column_round_trips_through_its_name() {
        for column in HeaderColumn::ALL {
            assert_eq!(column.as_str().parse::<HeaderColumn>(), Ok(column));
        }
    }

    #[test]
    fn rejects_unknown_columns() {
        assert_eq!(
            HeaderFilter::parse("slot; DROP TABLE", "1"),
            Err(FilterError::UnknownColumn("slot; DROP TABLE".into()))
        );
    }

    #[test]
    fn rejects_values_of_the_wrong_type() {
        assert!(matches!(
            HeaderFilter::parse("epoch", "three"),
            Err(FilterError::InvalidValue {
                column: HeaderColumn::Epoch,
                ..
            })
        ));
        assert!(HeaderFilter::parse("canonical", "yes").is_err());
    }

    #[test]
    fn numeric_and_boolean_filters_match() {
        let header = header();
        assert!(HeaderFilter::parse("slot", "100").unwrap().matches(&header));
        assert!(!HeaderFilter::parse("slot", "101").unwrap().matches(&header));
        assert!(HeaderFilter::parse("epoch", "3").unwrap().matches(&header));
        assert!(HeaderFilter::parse("canonical", "true").unwrap().matches(&header));
    }

    #[test]
    fn text_filters_compare_the_right_field() {
        let header = header();
        assert!(HeaderFilter::parse("proposer_index", "42").unwrap().matches(&header));
        assert!(HeaderFilter::parse("body_root", "0xbody").unwrap().matches(&header));
        assert!(!HeaderFilter::parse("state_root", "0xbody").unwrap().matches(&header));
    }
}
