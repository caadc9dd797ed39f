//! Thermal zone summary for the `sensors` command

use crate::telemetry::TelemetrySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThermalZone {
    Ambient,
    Cpu,
    Memory,
    Vr,
    Storage,
    Power,
    Chipset,
    Pci,
    Other,
}

/// Display classification, first match wins. `Other` is implied.
const ZONE_PATTERNS: &[(ThermalZone, &[&str])] = &[
    (ThermalZone::Ambient, &["inlet", "exhaust", "ambient"]),
    (ThermalZone::Cpu, &["cpu", "processor"]),
    (ThermalZone::Memory, &["dimm", "mem"]),
    (ThermalZone::Vr, &["vr p1", "vr p2"]),
    (ThermalZone::Storage, &["hd", "storage", "cntlr"]),
    (ThermalZone::Power, &["p/s", "psu", "power"]),
    (ThermalZone::Chipset, &["chipset", "ilo"]),
    (ThermalZone::Pci, &["pci"]),
];

impl ThermalZone {
    pub fn classify(name: &str) -> Self {
        let name = name.to_lowercase();
        ZONE_PATTERNS
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| name.contains(p)))
            .map(|(zone, _)| *zone)
            .unwrap_or(ThermalZone::Other)
    }

    pub fn label(self) -> &'static str {
        match self {
            ThermalZone::Ambient => "Ambient",
            ThermalZone::Cpu => "CPUs",
            ThermalZone::Memory => "Memory",
            ThermalZone::Vr => "Regulators",
            ThermalZone::Storage => "Storage",
            ThermalZone::Power => "Power Supply",
            ThermalZone::Chipset => "Chipset / iLO",
            ThermalZone::Pci => "PCI Slots",
            ThermalZone::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSensor {
    pub name: String,
    pub reading: f64,
    pub critical: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSummary {
    pub zone: ThermalZone,
    pub sensors: Vec<ZoneSensor>,
    pub min: f64,
    pub max: f64,
    /// Rounded to one decimal
    pub avg: f64,
    /// Highest critical threshold in the zone, 0 when none is reported
    pub max_critical: f64,
}

impl ZoneSummary {
    pub fn count(&self) -> usize {
        self.sensors.len()
    }
}

/// Group enabled sensors by zone, in display order, omitting empty zones
pub fn summarize(snapshot: &TelemetrySnapshot) -> Vec<ZoneSummary> {
    let mut summaries: Vec<ZoneSummary> = Vec::new();

    for sensor in snapshot.enabled_sensors() {
        let zone = ThermalZone::classify(&sensor.name);
        let entry = ZoneSensor {
            name: sensor.name.clone(),
            reading: sensor.value,
            critical: sensor.critical,
        };

        match summaries.iter_mut().find(|s| s.zone == zone) {
            Some(summary) => summary.sensors.push(entry),
            None => summaries.push(ZoneSummary {
                zone,
                sensors: vec![entry],
                min: 0.0,
                max: 0.0,
                avg: 0.0,
                max_critical: 0.0,
            }),
        }
    }

    for summary in &mut summaries {
        let readings = summary.sensors.iter().map(|s| s.reading);
        summary.min = readings.clone().fold(f64::INFINITY, f64::min);
        summary.max = readings.clone().fold(f64::NEG_INFINITY, f64::max);
        let mean = readings.sum::<f64>() / summary.sensors.len() as f64;
        summary.avg = (mean * 10.0).round() / 10.0;
        summary.max_critical = summary
            .sensors
            .iter()
            .filter_map(|s| s.critical)
            .fold(0.0, f64::max);
    }

    summaries.sort_by_key(|s| s.zone);
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::tests::THERMAL_FIXTURE;

    #[test]
    fn zone_patterns() {
        assert_eq!(ThermalZone::classify("12-Exhaust Air"), ThermalZone::Ambient);
        assert_eq!(ThermalZone::classify("Processor 2"), ThermalZone::Cpu);
        assert_eq!(ThermalZone::classify("14-VR P1 Mem"), ThermalZone::Memory);
        assert_eq!(ThermalZone::classify("18-VR P2"), ThermalZone::Vr);
        assert_eq!(ThermalZone::classify("20-HD Max"), ThermalZone::Storage);
        assert_eq!(ThermalZone::classify("30-P/S 1"), ThermalZone::Power);
        assert_eq!(ThermalZone::classify("25-iLO Zone"), ThermalZone::Chipset);
        assert_eq!(ThermalZone::classify("40-PCI 1"), ThermalZone::Pci);
        assert_eq!(ThermalZone::classify("50-Sys Exhaust"), ThermalZone::Ambient);
        assert_eq!(ThermalZone::classify("Battery Zone"), ThermalZone::Other);
    }

    #[test]
    fn groups_enabled_sensors_in_display_order() {
        let snapshot = TelemetrySnapshot::from_thermal_json(THERMAL_FIXTURE).unwrap();
        let zones = summarize(&snapshot);

        let order: Vec<ThermalZone> = zones.iter().map(|z| z.zone).collect();
        assert_eq!(
            order,
            vec![ThermalZone::Ambient, ThermalZone::Cpu, ThermalZone::Memory]
        );

        let cpu = &zones[1];
        assert_eq!(cpu.count(), 2);
        assert_eq!(cpu.min, 48.0);
        assert_eq!(cpu.max, 53.0);
        assert_eq!(cpu.avg, 50.5);
        assert_eq!(cpu.max_critical, 70.0);
        assert_eq!(cpu.zone.label(), "CPUs");
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        let json = r#"{"Temperatures": [
            {"Name": "P/S 1", "ReadingCelsius": 30, "Status": {"State": "Enabled"}},
            {"Name": "P/S 2", "ReadingCelsius": 31, "Status": {"State": "Enabled"}},
            {"Name": "P/S 3", "ReadingCelsius": 31, "Status": {"State": "Enabled"}}
        ]}"#;
        let snapshot = TelemetrySnapshot::from_thermal_json(json).unwrap();
        let zones = summarize(&snapshot);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].avg, 30.7);
        assert_eq!(zones[0].max_critical, 0.0);
    }
}
