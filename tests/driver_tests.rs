use autoparse::driver::{DriverConfig, DriverState, EntityTagger, StreamingDriver};
use autoparse::params::Parameter;
use autoparse::rules::RuleSet;

fn driver_with(format: &str) -> StreamingDriver {
    let config = DriverConfig {
        log_format: format.to_string(),
        extract_iocs: true,
    };
    StreamingDriver::new(config, RuleSet::defaults()).unwrap()
}

#[test]
fn record_carries_metadata_template_and_entities() {
    let mut driver = driver_with("<process>: <content>");
    let record = driver
        .process_line("sshd[42]: Accepted password for root from 10.0.0.1")
        .unwrap();

    assert_eq!(record.metadata.get("process").unwrap(), "sshd[42]");
    assert_eq!(record.message, "Accepted password for root from 10.0.0.1");
    assert_eq!(
        record.log_key,
        "Accepted password for root from <IP_ADDRESS>"
    );
    assert_eq!(record.event_id, 0);
    assert_eq!(record.log_id.len(), 8);
    assert_eq!(record.params.len(), 1);
    assert_eq!(record.params[0].entity.as_deref(), Some("ip_address"));
    assert_eq!(record.params[0].value, "10.0.0.1");
}

#[test]
fn params_are_sorted_by_char_start() {
    let mut driver = driver_with("<content>");
    let record = driver
        .process_line("admin@corp.example notified about 10.0.0.5")
        .unwrap();
    let starts: Vec<usize> = record.params.iter().map(|p| p.char_start).collect();
    let mut sorted = starts.clone();
    sorted.sort_unstable();
    assert_eq!(starts, sorted);
    assert_eq!(record.params[0].entity.as_deref(), Some("email"));
}

#[test]
fn malformed_lines_are_dropped_without_touching_the_store() {
    let mut driver = driver_with("<process>: <content>");
    driver.process_line("svc: worker 7 started").unwrap();
    assert!(driver.process_line("no separator in this line").is_err());
    assert_eq!(driver.dropped(), 1);
    assert_eq!(driver.processed(), 1);
    assert_eq!(driver.store().len(), 1);

    // the stream keeps going after a failure
    let record = driver.process_line("svc: worker 9 started").unwrap();
    assert_eq!(record.log_key, "worker <NUMBER> started");
    assert_eq!(driver.processed(), 2);
}

#[test]
fn wildcard_spans_round_trip_against_the_content() {
    let mut driver = driver_with("<content>");
    driver.process_line("job alpha finished ok").unwrap();
    let record = driver.process_line("job beta finished ok").unwrap();

    assert_eq!(record.log_key, "job * finished ok");
    let unnamed: Vec<&Parameter> = record
        .params
        .iter()
        .filter(|p| p.entity.as_deref() == Some("unnamed"))
        .collect();
    assert_eq!(unnamed.len(), 1);
    let p = unnamed[0];
    assert_eq!(p.value, "beta");
    assert_eq!(&record.message[p.char_start..p.char_end], "beta");
    assert_eq!(p.prev_token.as_deref(), Some("job"));
    assert_eq!(p.next_token.as_deref(), Some("finished"));
}

#[test]
fn defanged_indicators_are_masked_before_rule_matching() {
    let mut driver = driver_with("<content>");
    let record = driver
        .process_line("beacon to hxxp://evil[.]example/c2 from 10.9.9.9")
        .unwrap();
    let url = record
        .params
        .iter()
        .find(|p| p.entity.as_deref() == Some("url"))
        .unwrap();
    assert_eq!(url.refanged.as_deref(), Some("http://evil.example/c2"));
    assert!(record.log_key.contains("<URL>"));
    assert!(record.log_key.contains("<IP_ADDRESS>"));
}

#[test]
fn ioc_extraction_can_be_disabled() {
    let config = DriverConfig {
        log_format: "<content>".to_string(),
        extract_iocs: false,
    };
    let mut driver = StreamingDriver::new(config, RuleSet::defaults()).unwrap();
    let record = driver.process_line("ping from 10.1.1.1").unwrap();
    // the ordered rules still catch the address
    assert_eq!(record.params[0].entity.as_deref(), Some("ip_address"));
}

struct FixedTagger;

impl EntityTagger for FixedTagger {
    fn tag(&self, _content: &str) -> Vec<Parameter> {
        vec![Parameter::new(0, 4, 0, 1, "host", "gw01")]
    }
}

#[test]
fn external_tagger_results_are_merged() {
    let config = DriverConfig::default();
    let mut driver = StreamingDriver::new(config, RuleSet::defaults())
        .unwrap()
        .with_tagger(Box::new(FixedTagger));
    let record = driver.process_line("gw01 rebooted cleanly").unwrap();
    assert!(record
        .params
        .iter()
        .any(|p| p.entity.as_deref() == Some("host") && p.value == "gw01"));
}

#[test]
fn finish_flushes_distinct_templates_in_first_seen_order() {
    let mut driver = driver_with("<content>");
    driver.process_line("session opened for root").unwrap();
    driver.process_line("disk sync complete").unwrap();
    driver.process_line("session opened for guest").unwrap();

    let keys = driver.finish();
    assert_eq!(driver.state(), DriverState::Flushing);
    assert_eq!(
        keys,
        vec![
            "session opened for root".to_string(),
            "disk sync complete".to_string(),
            "session opened for *".to_string(),
        ]
    );
}

#[test]
fn non_ascii_runs_are_replaced_before_tokenizing() {
    let mut driver = driver_with("<content>");
    let record = driver.process_line("caf\u{e9} service ready").unwrap();
    assert_eq!(record.message, "caf<NASCII> service ready");
}
