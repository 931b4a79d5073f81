//! Tokenizer for the pool manager's plain-text status report.
//!
//! A report is one pool-summary block followed by zero or more worker blocks,
//! separated by [`BLOCK_DELIMITER`]. Each block holds `key: value` lines; only
//! lines with exactly one colon and an integer value become [`Field`]s. Every
//! other line is skipped silently, which keeps unknown or textual keys
//! (`pool`, `start time`, `process manager`, ...) out of the way.

/// Separates the pool summary from each worker report.
pub const BLOCK_DELIMITER: &str = "******";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub key: &'a str,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport<'a> {
    pub pool: Vec<Field<'a>>,
    pub workers: Vec<Vec<Field<'a>>>,
}

/// Splits a decoded report into its summary and worker blocks, preserving line order.
pub fn parse_report(text: &str) -> StatusReport<'_> {
    let mut blocks = text.split(BLOCK_DELIMITER);

    // `split` always yields at least one item, so the summary block is never missing.
    let pool = blocks.next().map(parse_block).unwrap_or_default();
    let workers = blocks.map(parse_block).collect();

    StatusReport { pool, workers }
}

pub fn parse_block(block: &str) -> Vec<Field<'_>> {
    block.split('\n').filter_map(parse_line).collect()
}

pub fn parse_line(line: &str) -> Option<Field<'_>> {
    let mut parts = line.split(':');
    let key = parts.next()?;
    let value = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let value = value.trim().parse::<i64>().ok()?;
    Some(Field {
        key: key.trim(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPORT: &str = "pool:                 www
process manager:      dynamic
start time:           19/Oct/2026:10:00:00 +0000
start since:          3600
accepted conn:        1234
listen queue:         0
max listen queue:     2
listen queue len:     128
idle processes:       3
active processes:     7
total processes:      10
max active processes: 9
max children reached: 1
slow requests:        4

************************
pid:                  101
state:                Idle
start time:           19/Oct/2026:10:00:00 +0000
start since:          10
requests:             5
request URI:          /index.php?a=b

************************
pid:                  102
state:                Running
start since:          20
requests:             15
";

    #[test]
    fn splits_summary_and_worker_blocks() {
        let report = parse_report(FULL_REPORT);

        assert_eq!(report.pool[0], Field { key: "start since", value: 3600 });
        assert!(report.pool.contains(&Field { key: "accepted conn", value: 1234 }));
        assert!(report.pool.iter().all(|f| f.key != "pool" && f.key != "start time"));

        let workers: Vec<_> = report.workers.iter().filter(|w| !w.is_empty()).collect();
        assert_eq!(workers.len(), 2);
        assert_eq!(
            workers[0],
            &vec![
                Field { key: "pid", value: 101 },
                Field { key: "start since", value: 10 },
                Field { key: "requests", value: 5 },
            ]
        );
        assert_eq!(workers[1][2], Field { key: "requests", value: 15 });
    }

    #[test]
    fn summary_only_report_has_no_workers() {
        assert!(parse_report("accepted conn: 1\n").workers.is_empty());

        let trailing = parse_report("accepted conn: 1\n******");
        assert_eq!(trailing.pool, vec![Field { key: "accepted conn", value: 1 }]);
        assert_eq!(trailing.workers, vec![Vec::<Field>::new()]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        for line in [
            "",
            "no separator",
            "a: 1: 2",
            "start time: 19/Oct/2026:10:00:00",
            "pool: www",
            "requests: 1.5",
            "requests:",
        ] {
            assert_eq!(parse_line(line), None, "line {:?}", line);
        }
    }

    #[test]
    fn trims_keys_and_values() {
        assert_eq!(
            parse_line("  slow requests :\t42 \r"),
            Some(Field { key: "slow requests", value: 42 })
        );
        assert_eq!(parse_line("delta: -3"), Some(Field { key: "delta", value: -3 }));
    }

    #[test]
    fn parsing_is_repeatable() {
        assert_eq!(parse_report(FULL_REPORT), parse_report(FULL_REPORT));
    }
}
