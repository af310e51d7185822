use nectar_core::flags::{SessionFlags, flags_from_enrichment, session_flags};
use nectar_core::record::{
    EnrichmentRecord, FileEnrichment, SessionEnrichment, SpurFields, empty_dshield,
};
use serde_json::{Value, json};

fn datacenter_spur() -> SpurFields {
    let mut fields = SpurFields::empty();
    fields.0[SpurFields::INFRASTRUCTURE] = "DATACENTER".to_string();
    fields
}

#[test]
fn empty_record_yields_all_false_flags() {
    let record = EnrichmentRecord::empty_session("s-0", "198.51.100.1");
    let flags = session_flags(&record);
    assert!(flags.is_clear());
    assert_eq!(flags, SessionFlags::default());
}

#[test]
fn high_risk_session_flags_all_three_ip_services() {
    let record = EnrichmentRecord::Session {
        session_id: "s-1".to_string(),
        src_ip: "203.0.113.10".to_string(),
        enrichment: SessionEnrichment {
            dshield: json!({"ip": {"count": "10", "attacks": "5", "asname": "EvilCorp", "ascountry": "RU"}}),
            urlhaus: "botnet, malware, trojan".to_string(),
            spur: datacenter_spur(),
        },
    };
    let flags = session_flags(&record);
    assert!(flags.dshield_flagged);
    assert!(flags.urlhaus_flagged);
    assert!(flags.spur_flagged);
    assert!(!flags.vt_flagged);
}

#[test]
fn dshield_counts_coerce_from_strings_and_numbers() {
    for count in [json!("3"), json!(3)] {
        let enrichment = json!({"dshield": {"ip": {"count": count, "asname": ""}}});
        assert!(flags_from_enrichment(&enrichment).dshield_flagged);
    }
    let zero = json!({"dshield": {"ip": {"count": "0", "attacks": 0}}});
    assert!(!flags_from_enrichment(&zero).dshield_flagged);
}

#[test]
fn spur_flag_matches_infrastructure_case_insensitively() {
    for infra in ["DATACENTER", "datacenter", "Vpn"] {
        let mut fields = vec![String::new(); 18];
        fields[3] = infra.to_string();
        let enrichment = json!({"spur": fields});
        assert!(flags_from_enrichment(&enrichment).spur_flagged, "{infra}");
    }
    let enrichment = json!({"spur": ["", "", "", "RESIDENTIAL"]});
    assert!(!flags_from_enrichment(&enrichment).spur_flagged);
}

#[test]
fn grouped_session_shape_iterates_every_payload() {
    let enrichment = json!({
        "session": {
            "203.0.113.10": {"dshield": {"ip": {"attacks": "2"}}, "urlhaus": "", "spur": []},
            "198.51.100.7": {"dshield": empty_dshield(), "urlhaus": "malware", "spur": []},
        }
    });
    let flags = flags_from_enrichment(&enrichment);
    assert!(flags.dshield_flagged);
    assert!(flags.urlhaus_flagged);
    assert!(!flags.spur_flagged);
}

#[test]
fn vt_flag_traverses_nested_payloads_inside_the_virustotal_field() {
    let malicious = json!({
        "virustotal": {
            "data": {"attributes": {"last_analysis_stats": {"malicious": 4, "harmless": 60}}}
        }
    });
    assert!(flags_from_enrichment(&malicious).vt_flagged);

    // Per-file payloads grouped under the scanner field still count.
    let nested = json!({
        "virustotal": [
            {"data": {"attributes": {"last_analysis_stats": {"malicious": 0}}}},
            {"data": {"attributes": {"last_analysis_stats": {"malicious": 1}}}},
        ]
    });
    assert!(flags_from_enrichment(&nested).vt_flagged);

    let clean = json!({"virustotal": null});
    assert!(!flags_from_enrichment(&clean).vt_flagged);
}

#[test]
fn vt_flag_is_read_from_grouped_session_payloads() {
    let grouped = json!({
        "session": {
            "203.0.113.10": {
                "dshield": {"ip": {"count": "0"}},
                "virustotal": {
                    "data": {"attributes": {"last_analysis_stats": {"malicious": 2}}}
                },
            }
        }
    });
    assert!(flags_from_enrichment(&grouped).vt_flagged);
}

#[test]
fn scanner_shaped_objects_outside_the_virustotal_field_are_ignored() {
    let decoy = json!({
        "dshield": {
            "data": {"attributes": {"last_analysis_stats": {"malicious": 9}}}
        },
        "urlhaus": "",
        "spur": [],
    });
    let flags = flags_from_enrichment(&decoy);
    assert!(!flags.vt_flagged);
    assert!(!flags.dshield_flagged);
}

#[test]
fn file_record_flags_only_vt() {
    let record = EnrichmentRecord::File {
        file_hash: "abc".to_string(),
        filename: "mal.exe".to_string(),
        enrichment: FileEnrichment {
            virustotal: Some(json!({
                "data": {"attributes": {"last_analysis_stats": {"malicious": 2}}}
            })),
        },
    };
    let flags = session_flags(&record);
    assert!(flags.vt_flagged);
    assert!(!flags.dshield_flagged);
}

#[test]
fn spur_fields_serialize_as_a_bare_18_element_array() {
    let fields = SpurFields::empty();
    let value = serde_json::to_value(&fields).unwrap();
    let Value::Array(items) = value else {
        panic!("expected array serialization");
    };
    assert_eq!(items.len(), 18);
    assert!(items.iter().all(|v| v == &json!("")));
}

#[test]
fn session_record_serializes_in_the_legacy_shape() {
    let record = EnrichmentRecord::empty_session("s-9", "192.0.2.5");
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["session_id"], json!("s-9"));
    assert_eq!(value["src_ip"], json!("192.0.2.5"));
    assert_eq!(value["enrichment"]["dshield"], empty_dshield());
    assert_eq!(value["enrichment"]["urlhaus"], json!(""));
    assert_eq!(value["enrichment"]["spur"].as_array().unwrap().len(), 18);
}
