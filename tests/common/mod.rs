#![allow(dead_code)]

use std::sync::Arc;

use netex_validator::catalog::default_tree_builder;
use netex_validator::dataset::{DatasetConfig, DatasetValidator};
use netex_validator::validators::{
    BlockJourneyReferencesIgnorer, ExternalCodespaceIgnorer, ExternalReferenceValidator,
};
use netex_validator::{ValidationReport, ValidationTree};
use tempfile::TempDir;
use tokio::fs;

pub const CODESPACE: &str = "TST";

pub const COMMON_FILE_NAME: &str = "_TST_shared_data.xml";

/// Shared data: an authority, a network, two stop points and their quays
pub const COMMON_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PublicationDelivery version="1.15">
  <dataObjects>
    <CompositeFrame id="TST:CompositeFrame:1" version="1">
      <frames>
        <ResourceFrame id="TST:ResourceFrame:1" version="1">
          <organisations>
            <Authority id="TST:Authority:1" version="1">
              <Name>Test Authority</Name>
              <ContactDetails>
                <Url>https://example.com</Url>
              </ContactDetails>
            </Authority>
          </organisations>
        </ResourceFrame>
        <ServiceFrame id="TST:ServiceFrame:1" version="1">
          <Network id="TST:Network:1" version="1">
            <Name>Test network</Name>
            <AuthorityRef ref="TST:Authority:1" version="1"/>
          </Network>
          <scheduledStopPoints>
            <ScheduledStopPoint id="TST:ScheduledStopPoint:1" version="1"/>
            <ScheduledStopPoint id="TST:ScheduledStopPoint:2" version="1"/>
          </scheduledStopPoints>
          <stopAssignments>
            <PassengerStopAssignment id="TST:PassengerStopAssignment:1" version="1" order="1">
              <ScheduledStopPointRef ref="TST:ScheduledStopPoint:1" version="1"/>
              <QuayRef ref="NSR:Quay:1"/>
            </PassengerStopAssignment>
            <PassengerStopAssignment id="TST:PassengerStopAssignment:2" version="1" order="2">
              <ScheduledStopPointRef ref="TST:ScheduledStopPoint:2" version="1"/>
              <QuayRef ref="NSR:Quay:2"/>
            </PassengerStopAssignment>
          </stopAssignments>
        </ServiceFrame>
      </frames>
    </CompositeFrame>
  </dataObjects>
</PublicationDelivery>
"#;

/// A line file whose ids are all suffixed by `n`, except the line id
pub fn line_file(n: u32, line_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<PublicationDelivery version="1.15">
  <dataObjects>
    <CompositeFrame id="TST:CompositeFrame:L{n}" version="1">
      <frames>
        <ServiceFrame id="TST:ServiceFrame:L{n}" version="1">
          <lines>
            <Line id="{line_id}" version="1">
              <Name>Line {n}</Name>
              <PublicCode>{n}</PublicCode>
              <TransportMode>bus</TransportMode>
              <RepresentedByGroupRef ref="TST:Network:1" version="1"/>
            </Line>
          </lines>
          <journeyPatterns>
            <JourneyPattern id="TST:JourneyPattern:{n}" version="1">
              <pointsInSequence>
                <StopPointInJourneyPattern id="TST:StopPointInJourneyPattern:{n}-1" version="1" order="1">
                  <ScheduledStopPointRef ref="TST:ScheduledStopPoint:1" version="1"/>
                </StopPointInJourneyPattern>
                <StopPointInJourneyPattern id="TST:StopPointInJourneyPattern:{n}-2" version="1" order="2">
                  <ScheduledStopPointRef ref="TST:ScheduledStopPoint:2" version="1"/>
                </StopPointInJourneyPattern>
              </pointsInSequence>
            </JourneyPattern>
          </journeyPatterns>
        </ServiceFrame>
        <TimetableFrame id="TST:TimetableFrame:L{n}" version="1">
          <vehicleJourneys>
            <ServiceJourney id="TST:ServiceJourney:{n}" version="1">
              <JourneyPatternRef ref="TST:JourneyPattern:{n}" version="1"/>
              <passingTimes>
                <TimetabledPassingTime id="TST:TimetabledPassingTime:{n}-1" version="1">
                  <StopPointInJourneyPatternRef ref="TST:StopPointInJourneyPattern:{n}-1" version="1"/>
                  <DepartureTime>08:00:00</DepartureTime>
                </TimetabledPassingTime>
                <TimetabledPassingTime id="TST:TimetabledPassingTime:{n}-2" version="1">
                  <StopPointInJourneyPatternRef ref="TST:StopPointInJourneyPattern:{n}-2" version="1"/>
                  <ArrivalTime>08:10:00</ArrivalTime>
                </TimetabledPassingTime>
              </passingTimes>
            </ServiceJourney>
          </vehicleJourneys>
        </TimetableFrame>
      </frames>
    </CompositeFrame>
  </dataObjects>
</PublicationDelivery>
"#
    )
}

/// A line file with a block chaining a journey declared in another line file
pub fn line_file_with_block(n: u32, foreign_journey: &str) -> String {
    line_file(n, &format!("TST:Line:{n}")).replace(
        "      </frames>",
        &format!(
            r#"        <VehicleScheduleFrame id="TST:VehicleScheduleFrame:L{n}" version="1">
          <blocks>
            <Block id="TST:Block:{n}" version="1">
              <journeys>
                <ServiceJourneyRef ref="{foreign_journey}" version="1"/>
              </journeys>
            </Block>
          </blocks>
        </VehicleScheduleFrame>
      </frames>"#
        ),
    )
}

pub fn default_tree() -> Arc<ValidationTree> {
    Arc::new(default_tree_builder().unwrap().build().unwrap())
}

/// Quays live in the national stop register, outside the dataset
pub fn default_external_validators() -> Vec<Arc<dyn ExternalReferenceValidator>> {
    vec![
        Arc::new(BlockJourneyReferencesIgnorer),
        Arc::new(ExternalCodespaceIgnorer::new(["NSR"])),
    ]
}

pub fn dataset_validator(
    external_validators: Vec<Arc<dyn ExternalReferenceValidator>>,
) -> DatasetValidator {
    DatasetValidator::in_memory(
        default_tree(),
        external_validators,
        DatasetConfig::default(),
        |builder| builder,
    )
}

pub fn entries_for<'a>(
    report: &'a ValidationReport,
    rule_name: &'a str,
) -> impl Iterator<Item = &'a netex_validator::ValidationReportEntry> + 'a {
    report
        .entries()
        .iter()
        .filter(move |entry| entry.name == rule_name)
}

/// Write `files` into a fresh temporary directory
pub async fn write_dataset(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(path, content).await.unwrap();
    }
    temp_dir
}
