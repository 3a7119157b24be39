mod common;

use std::sync::Arc;

use common::*;
use netex_validator::dataset::DatasetFile;
use netex_validator::repository::{
    CommonDataRepository, InMemoryCommonDataRepository, InMemoryNetexIdRepository,
    NetexIdRepository,
};
use netex_validator::{FileDiscovery, NetexValidatorsRunner, Severity};

const DUPLICATE_ID: &str = "Duplicate NeTEx id";
const UNRESOLVED_REFERENCE: &str = "Unresolved reference";
const MISSING_STOP_ASSIGNMENT: &str = "Missing stop assignment";
const INCONSISTENT_SERVICE_LINK: &str = "Service link does not match journey pattern";

#[tokio::test]
async fn test_complete_dataset_is_valid() {
    let validator = dataset_validator(default_external_validators());
    let results = validator
        .validate_files(
            CODESPACE,
            vec![
                DatasetFile::new(COMMON_FILE_NAME, COMMON_FILE),
                DatasetFile::new("TST_Line_1.xml", line_file(1, "TST:Line:1")),
                DatasetFile::new("TST_Line_2.xml", line_file(2, "TST:Line:2")),
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.common_files, 1);
    assert_eq!(results.line_files, 2);
    assert!(
        !results.report.has_error(),
        "unexpected errors: {:#?}",
        results.report.entries()
    );
    assert_eq!(results.report.codespace, CODESPACE);
}

#[tokio::test]
async fn test_duplicate_id_reported_in_second_file_only() {
    let validator = dataset_validator(default_external_validators());
    let results = validator
        .validate_files(
            CODESPACE,
            vec![
                DatasetFile::new("TST_Line_2.xml", line_file(2, "TST:Line:1")),
                DatasetFile::new(COMMON_FILE_NAME, COMMON_FILE),
                DatasetFile::new("TST_Line_1.xml", line_file(1, "TST:Line:1")),
            ],
        )
        .await
        .unwrap();

    // Line files run concurrently by default, so either one may be second
    let duplicates: Vec<_> = entries_for(&results.report, DUPLICATE_ID).collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].object_id.as_deref(), Some("TST:Line:1"));
    assert_eq!(duplicates[0].severity, Severity::Error);
    assert!(duplicates[0].filename.starts_with("TST_Line_"));
}

#[tokio::test]
async fn test_common_file_is_validated_first_whatever_the_input_order() {
    let validator = dataset_validator(default_external_validators());
    let results = validator
        .validate_files(
            CODESPACE,
            vec![
                DatasetFile::new("TST_Line_1.xml", line_file(1, "TST:Line:1")),
                DatasetFile::new(COMMON_FILE_NAME, COMMON_FILE),
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.report.count_for(UNRESOLVED_REFERENCE), 0);
    assert_eq!(results.report.count_for(MISSING_STOP_ASSIGNMENT), 0);
    assert!(!results.report.has_error());
}

#[tokio::test]
async fn test_dataset_without_common_file() {
    let validator = dataset_validator(default_external_validators());
    let results = validator
        .validate_files(
            CODESPACE,
            vec![DatasetFile::new("TST_Line_1.xml", line_file(1, "TST:Line:1"))],
        )
        .await
        .unwrap();

    // Two stop points and the network
    assert_eq!(results.report.count_for(UNRESOLVED_REFERENCE), 3);
    let unassigned: Vec<_> = entries_for(&results.report, MISSING_STOP_ASSIGNMENT).collect();
    assert_eq!(unassigned.len(), 2);
    assert!(
        unassigned
            .iter()
            .all(|entry| entry.object_id.as_deref() == Some("TST:JourneyPattern:1"))
    );
    assert!(results.report.has_error());
}

#[tokio::test]
async fn test_block_may_reference_journeys_of_other_files() {
    let files = || {
        vec![
            DatasetFile::new(COMMON_FILE_NAME, COMMON_FILE),
            DatasetFile::new("TST_Line_1.xml", line_file(1, "TST:Line:1")),
            DatasetFile::new(
                "TST_Line_2.xml",
                line_file_with_block(2, "TST:ServiceJourney:1"),
            ),
        ]
    };

    let validator = dataset_validator(default_external_validators());
    let results = validator.validate_files(CODESPACE, files()).await.unwrap();
    assert_eq!(results.report.count_for(UNRESOLVED_REFERENCE), 0);

    let strict = dataset_validator(vec![Arc::new(
        netex_validator::validators::ExternalCodespaceIgnorer::new(["NSR"]),
    )]);
    let results = strict.validate_files(CODESPACE, files()).await.unwrap();
    let unresolved: Vec<_> = entries_for(&results.report, UNRESOLVED_REFERENCE).collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].filename, "TST_Line_2.xml");
    assert_eq!(unresolved[0].object_id.as_deref(), Some("TST:ServiceJourney:1"));
}

#[tokio::test]
async fn test_service_link_with_empty_endpoint_does_not_abort_the_dataset() {
    let common = COMMON_FILE.replace(
        "          </stopAssignments>\n",
        r#"          </stopAssignments>
          <serviceLinks>
            <ServiceLink id="TST:ServiceLink:1" version="1">
              <FromPointRef ref=""/>
              <ToPointRef ref="TST:ScheduledStopPoint:2" version="1"/>
            </ServiceLink>
            <ServiceLink id="TST:ServiceLink:2" version="1">
              <FromPointRef ref="TST:ScheduledStopPoint:2" version="1"/>
              <ToPointRef ref="TST:ScheduledStopPoint:1" version="1"/>
            </ServiceLink>
          </serviceLinks>
"#,
    );
    let with_link = |n: u32, service_link: &str| {
        line_file(n, &format!("TST:Line:{n}")).replace(
            "              </pointsInSequence>\n",
            &format!(
                r#"              </pointsInSequence>
              <linksInSequence>
                <ServiceLinkInJourneyPattern id="TST:ServiceLinkInJourneyPattern:{n}-1" version="1" order="1">
                  <ServiceLinkRef ref="{service_link}" version="1"/>
                </ServiceLinkInJourneyPattern>
              </linksInSequence>
"#
            ),
        )
    };

    let validator = dataset_validator(default_external_validators());
    let results = validator
        .validate_files(
            CODESPACE,
            vec![
                DatasetFile::new(COMMON_FILE_NAME, common.as_str()),
                DatasetFile::new("TST_Line_1.xml", with_link(1, "TST:ServiceLink:1")),
                DatasetFile::new("TST_Line_2.xml", with_link(2, "TST:ServiceLink:2")),
            ],
        )
        .await
        .unwrap();

    // The unreadable link is skipped, the reversed one is still looked up
    let inconsistent: Vec<_> = entries_for(&results.report, INCONSISTENT_SERVICE_LINK).collect();
    assert_eq!(inconsistent.len(), 1);
    assert_eq!(inconsistent[0].filename, "TST_Line_2.xml");
    assert_eq!(inconsistent[0].object_id.as_deref(), Some("TST:JourneyPattern:2"));
}

#[tokio::test]
async fn test_state_is_released_between_runs() {
    let validator = dataset_validator(default_external_validators());
    let files = || {
        vec![
            DatasetFile::new(COMMON_FILE_NAME, COMMON_FILE),
            DatasetFile::new("TST_Line_1.xml", line_file(1, "TST:Line:1")),
        ]
    };

    let first = validator.validate_files(CODESPACE, files()).await.unwrap();
    let second = validator.validate_files(CODESPACE, files()).await.unwrap();

    assert_ne!(first.report.report_id, second.report.report_id);
    assert_eq!(second.report.count_for(DUPLICATE_ID), 0);
}

#[tokio::test]
async fn test_malformed_file_does_not_stop_the_dataset() {
    let validator = dataset_validator(default_external_validators());
    let results = validator
        .validate_files(
            CODESPACE,
            vec![
                DatasetFile::new(COMMON_FILE_NAME, COMMON_FILE),
                DatasetFile::new("TST_Line_1.xml", "<PublicationDelivery><lines>"),
                DatasetFile::new("TST_Line_2.xml", line_file(2, "TST:Line:2")),
            ],
        )
        .await
        .unwrap();

    let broken: Vec<_> = results
        .report
        .entries()
        .iter()
        .filter(|entry| entry.filename == "TST_Line_1.xml")
        .collect();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].name, "NeTEx schema validation");
    assert!(
        results
            .report
            .entries()
            .iter()
            .all(|entry| entry.filename != "TST_Line_2.xml" || !entry.severity.is_error())
    );
}

#[tokio::test]
async fn test_validate_path_discovers_nested_files() {
    let line = line_file(1, "TST:Line:1");
    let dataset = write_dataset(&[
        (COMMON_FILE_NAME, COMMON_FILE),
        ("lines/TST_Line_1.xml", &line),
        ("README.txt", "not a NeTEx file"),
    ])
    .await;

    let validator = dataset_validator(default_external_validators());
    let results = validator
        .validate_path(CODESPACE, dataset.path(), &FileDiscovery::new())
        .await
        .unwrap();

    assert_eq!(results.total_files(), 2);
    assert_eq!(results.common_files, 1);
    assert!(!results.report.has_error());
}

#[tokio::test]
async fn test_validate_path_single_file() {
    let dataset = write_dataset(&[(COMMON_FILE_NAME, COMMON_FILE)]).await;
    let validator = dataset_validator(default_external_validators());
    let results = validator
        .validate_path(
            CODESPACE,
            &dataset.path().join(COMMON_FILE_NAME),
            &FileDiscovery::new(),
        )
        .await
        .unwrap();

    assert_eq!(results.common_files, 1);
    assert_eq!(results.line_files, 0);
    assert!(!results.report.has_error());
}

#[test]
fn test_line_before_common_leaves_references_unresolved() {
    let ids: Arc<dyn NetexIdRepository> = Arc::new(InMemoryNetexIdRepository::new());
    let common: Arc<dyn CommonDataRepository> = Arc::new(InMemoryCommonDataRepository::new());
    let runner = NetexValidatorsRunner::builder()
        .with_default_validators(
            default_tree(),
            Arc::clone(&ids),
            Arc::clone(&common),
            default_external_validators(),
        )
        .build();
    common.register("r");

    let line = line_file(1, "TST:Line:1");
    let early = runner
        .validate(CODESPACE, "r", "TST_Line_1.xml", line.as_bytes())
        .unwrap();
    assert_eq!(early.count_for(UNRESOLVED_REFERENCE), 3);
    assert_eq!(early.count_for(MISSING_STOP_ASSIGNMENT), 2);

    let shared = runner
        .validate(CODESPACE, "r", COMMON_FILE_NAME, COMMON_FILE.as_bytes())
        .unwrap();
    assert!(!shared.has_error());
    assert!(ids.has_shared_netex_id("r", "TST:ScheduledStopPoint:1"));

    let late = runner
        .validate(
            CODESPACE,
            "r",
            "TST_Line_2.xml",
            line_file(2, "TST:Line:2").as_bytes(),
        )
        .unwrap();
    assert_eq!(late.count_for(UNRESOLVED_REFERENCE), 0);
    assert_eq!(late.count_for(MISSING_STOP_ASSIGNMENT), 0);

    ids.clean_up("r");
    common.clean_up("r");
}
