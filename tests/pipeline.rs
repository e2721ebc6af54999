//! End-to-end: convert external logs, then validate and summarize the output

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use flightconv::container::ContainerStream;
use flightconv::stats::FlightStats;
use flightconv::validate::ValidationState;
use flightconv::{convert_file, validate_file, ConvertOptions, Error, SourceFormat};
use serde_json::Value;

/// 8x5 P5 grid with the same undulation everywhere
fn flat_geoid(dir: &Path, undulation: u16) -> PathBuf {
    let path = dir.join("flat.pgm");
    let mut bytes = b"P5\n# Offset 0\n# Scale 1\n8 5\n65535\n".to_vec();
    for _ in 0..8 * 5 {
        bytes.extend_from_slice(&undulation.to_be_bytes());
    }
    fs::write(&path, bytes).unwrap();
    path
}

fn read_lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_csgroup_convert_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tracks.csv");
    let output = dir.path().join("tracks.jsonl");
    fs::write(
        &input,
        "event_type,datetime_ms,track_id,latitude,longitude,altitude\n\
         TRACK,1709294400000,T1,50.1,14.2,300.5\n\
         STATUS,1709294400500,,,,\n\
         TRACK,1709294401000,T1,50.2,14.3,301.0\n",
    )
    .unwrap();

    convert_file(SourceFormat::CsGroup, &ConvertOptions::default(), &input, &output).unwrap();

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["content"], "flightlog");
    assert_eq!(lines[0]["source"], "csgroup");
    assert_eq!(lines[0]["origin"], "tracks.csv");

    let report = validate_file(&output).unwrap();
    assert_eq!(report.state, ValidationState::Valid);
    assert_eq!(report.error_count, 0);

    let mut stream = ContainerStream::open_read(&output).unwrap();
    let stats = FlightStats::from_container(&mut stream).unwrap();
    assert_eq!(stats.time.min, 1709294400000.0);
    assert_eq!(stats.alt.max, 301.0);
}

#[test]
fn test_robin_blocks_convert_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("robin.log");
    let output = dir.path().join("robin.jsonl");
    fs::write(
        &input,
        "radar started\n\
         <Robin>\n\
         <Track id=\"A\"><Timestamp>2024-03-01T12:00:00.000Z</Timestamp>\n\
         <Position><Latitude>1.0</Latitude><Longitude>2.0</Longitude><Altitude>3.0</Altitude></Position>\n\
         </Track>\n\
         </Robin>\n\
         heartbeat\n\
         <Robin><Track id=\"B\"><Timestamp>bad</Timestamp></Track></Robin>\n\
         <Robin>\n\
         <Track id=\"C\">\n",
    )
    .unwrap();

    convert_file(SourceFormat::RobinRadar, &ConvertOptions::default(), &input, &output).unwrap();

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["time"]["unix"], 1709294400000i64);
    assert_eq!(lines[1]["uaid"]["int"], "A");

    assert!(validate_file(&output).unwrap().is_valid());
}

#[test]
fn test_nmea_uses_base_date_and_separation() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gps.nmea");
    let output = dir.path().join("gps.jsonl");
    fs::write(
        &input,
        "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n",
    )
    .unwrap();

    let mut options = ConvertOptions {
        egm: Some(flat_geoid(dir.path(), 20)),
        ..ConvertOptions::default()
    };

    let err = convert_file(SourceFormat::Nmea, &options, &input, &output).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    options.base_date = NaiveDate::from_ymd_opt(1994, 3, 23);
    convert_file(SourceFormat::Nmea, &options, &input, &output).unwrap();

    let lines = read_lines(&output);
    assert_eq!(lines[0]["geoid"], "flat.pgm");

    let loc = &lines[1]["pos"]["loc"];
    assert!((loc["lat"].as_f64().unwrap() - 48.1173).abs() < 1e-4);
    assert!((loc["lon"].as_f64().unwrap() - 11.516_666).abs() < 1e-4);
    assert!((loc["alt"].as_f64().unwrap() - 592.3).abs() < 1e-9);
    assert_eq!(loc["amsl"], 545.4);

    assert!(validate_file(&output).unwrap().is_valid());
}

#[test]
fn test_validation_error_cap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jsonl");
    let mut text = String::from("{\"content\": \"flightlog\"}\n");
    for _ in 0..150 {
        text.push_str("{\"time\": {\"unix\": \"soon\"}}\n");
    }
    fs::write(&path, text).unwrap();

    let report = validate_file(&path).unwrap();
    assert_eq!(report.state, ValidationState::Invalid);
    assert_eq!(report.error_count, 100);
    assert_eq!(report.lines_read, 101);
    assert!(report.hit_error_cap());
}

#[test]
fn test_invalid_metadata_stops_at_first_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unknown.jsonl");
    fs::write(&path, "{\"content\": \"weather\"}\n{\"time\": {\"unix\": 1}}\n").unwrap();

    let report = validate_file(&path).unwrap();
    assert_eq!(report.state, ValidationState::MetadataInvalid);
    assert_eq!(report.lines_read, 1);
}

#[test]
fn test_senhive_convert_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("senhive.csv");
    let output = dir.path().join("senhive.jsonl");
    fs::write(
        &input,
        "'timestamp';'track_id';'vehicle_serial_number';'vehicle_location_lat';'vehicle_location_lon';'altitude_gps (m)'\n\
         2024-03-01 12:00:00.000;7;SN-1;50.0;14.0;120.5\n\
         2024-03-01 12:00:01.000;7;SN-1;;14.0;120.5\n",
    )
    .unwrap();

    convert_file(SourceFormat::SenHive, &ConvertOptions::default(), &input, &output).unwrap();

    assert_eq!(read_lines(&output).len(), 2);
    assert!(validate_file(&output).unwrap().is_valid());
}

#[test]
fn test_courageous_radarlog_has_no_altitude_stats() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.json");
    let output = dir.path().join("radar.jsonl");
    fs::write(
        &input,
        r#"{"tracks": [{"name": "drone", "uas_id": 3, "records": [
            {"time": 2000, "location": {"t": "BearingElevation", "c": {"bearing": 45.0, "elevation": 2.0}}},
            {"time": 1000, "location": {"t": "BearingElevation", "c": {"bearing": 40.0, "elevation": 1.5}}}
        ]}]}"#,
    )
    .unwrap();

    let options = ConvertOptions::from_toml("target = \"radarlog\"").unwrap();
    convert_file(SourceFormat::Courageous, &options, &input, &output).unwrap();

    let lines = read_lines(&output);
    assert_eq!(lines[0]["content"], "radarlog");
    assert_eq!(lines[1]["time"]["unix"], 1000);
    assert!(validate_file(&output).unwrap().is_valid());

    let mut stream = ContainerStream::open_read(&output).unwrap();
    let stats = FlightStats::from_container(&mut stream).unwrap();
    assert_eq!(stats.time.max, 2000.0);
    assert!(stats.alt.is_empty());
    assert!(stats.to_string().contains("Altitude: no data"));
}

#[test]
fn test_datcon_convert_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("FLY001.txt");
    let output = dir.path().join("datcon.jsonl");
    fs::write(
        &input,
        "TS (nanoseconds) TZ ID GUID Latitude Longitude Altitude (meters above sea)\n\
         1700000000123456789 UTC 12 N/A 49.5 16.25 410.0\n\
         1700000001000000000 UTC 12 N/A 49.6 16.30 412.5\n",
    )
    .unwrap();

    let options = ConvertOptions {
        egm: Some(flat_geoid(dir.path(), 40)),
        ..ConvertOptions::default()
    };
    convert_file(SourceFormat::DatCon, &options, &input, &output).unwrap();

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["pos"]["loc"]["alt"], 450.0);
    assert_eq!(lines[1]["pos"]["loc"]["amsl"], 410.0);
    assert!(validate_file(&output).unwrap().is_valid());
}

#[test]
fn test_artlog_convert_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("art.log");
    let output = dir.path().join("art.jsonl");
    fs::write(
        &input,
        "Timestamp_nsec TimeZone TrackUUID Latitude Longitude Altitude\n\
         1700000000999999999 UTC 0b7c 48.1 11.5 520.25\n\
         1700000001999999999 UTC 0b7c 48.2 11.6 521.0\n",
    )
    .unwrap();

    convert_file(SourceFormat::ArtLog, &ConvertOptions::default(), &input, &output).unwrap();

    assert_eq!(read_lines(&output).len(), 3);
    assert!(validate_file(&output).unwrap().is_valid());
}

#[test]
fn test_gnettrack_convert_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("drive.txt");
    let output = dir.path().join("drive.jsonl");
    fs::write(
        &input,
        "Timestamp\tLongitude\tLatitude\tAltitude\tDEVICE\tNetworkTech\tCSI_RSRP\n\
         2024.03.01_12.00.00\t14.4\t50.1\t200\tPhone1\tLTE\t-101\n\
         2024.03.01_12.00.01\t14.4\t50.1\t201\tPhone1\tNR\t-99\n\
         2024.03.01_12.00.02\t14.4\t50.1\t202\tPhone1\tUMTS\t-90\n",
    )
    .unwrap();

    let options = ConvertOptions {
        egm: Some(flat_geoid(dir.path(), 10)),
        ..ConvertOptions::default()
    };
    convert_file(SourceFormat::GNetTrack, &options, &input, &output).unwrap();

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1]["cellsig"]["radio"], "4G");
    assert_eq!(lines[2]["cellsig"]["radio"], "5Gd");
    assert!(lines[3].get("cellsig").is_none());
    assert!(validate_file(&output).unwrap().is_valid());
}

#[test]
fn test_safirmqtt_convert_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mqtt.jsonl");
    let output = dir.path().join("safir.jsonl");
    let message = serde_json::json!({
        "version": "1",
        "timestamp": "2024-03-01T12:00:00.000Z",
        "identifiers": [{"version": "1", "system": "ICAOHex", "key": "4B1234"}],
        "location": {"version": "1", "latitude": 50.0, "longitude": 14.0, "altitudeAMSL": 300.0},
        "origin": "sensor-a"
    });
    fs::write(&input, format!("{}\n{}\n", message, message)).unwrap();

    let options = ConvertOptions {
        egm: Some(flat_geoid(dir.path(), 45)),
        ..ConvertOptions::default()
    };
    convert_file(SourceFormat::SafirMqtt, &options, &input, &output).unwrap();

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["pos"]["loc"]["alt"], 345.0);
    assert!(validate_file(&output).unwrap().is_valid());
}

#[test]
fn test_courageous_flightlog_convert_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.json");
    let output = dir.path().join("flight.jsonl");
    fs::write(
        &input,
        r#"{"tracks": [{"name": "drone", "uas_id": 3, "records": [
            {"time": 2000, "location": {"t": "Position3d", "c": {"lat": 1.5, "lon": 2.5, "height_amsl": 20.0}}},
            {"time": 1000, "location": {"t": "Position3d", "c": {"lat": 1.0, "lon": 2.0, "height_amsl": 10.0}}}
        ]}]}"#,
    )
    .unwrap();

    let options = ConvertOptions {
        egm: Some(flat_geoid(dir.path(), 5)),
        ..ConvertOptions::default()
    };
    convert_file(SourceFormat::Courageous, &options, &input, &output).unwrap();

    let lines = read_lines(&output);
    assert_eq!(lines[0]["content"], "flightlog");
    assert_eq!(lines[1]["time"]["unix"], 1000);
    assert_eq!(lines[1]["pos"]["loc"]["alt"], 15.0);
    assert!(validate_file(&output).unwrap().is_valid());
}
