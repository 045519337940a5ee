use time::{
    format_description::well_known::Rfc3339, Duration, OffsetDateTime, PrimitiveDateTime,
    UtcOffset,
};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    to_primitive_utc(OffsetDateTime::now_utc())
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

pub(crate) fn parse_rfc3339(value: &str) -> Option<PrimitiveDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok().map(to_primitive_utc)
}

pub(crate) fn add_days(value: PrimitiveDateTime, days: i64) -> PrimitiveDateTime {
    value + Duration::days(days)
}
