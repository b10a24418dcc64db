use serde::{Deserialize, Serialize};

use super::conversion::FHIRConverter;
use super::{CodeableConcept, FHIRError, Quantity, Reference};
use crate::storage::{Observation, PatientRecord};
use crate::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationResource {
    pub id: Option<String>,
    pub subject: Option<Reference>,
    pub effective_date_time: Option<String>,
    pub issued: Option<String>,
    #[serde(default)]
    pub code: CodeableConcept,
    pub value_quantity: Option<Quantity>,
    pub value_string: Option<String>,
    #[serde(default)]
    pub component: Vec<ObservationComponent>,
}

/// One part of a panel observation such as a blood-pressure reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationComponent {
    #[serde(default)]
    pub code: CodeableConcept,
    pub value_quantity: Option<Quantity>,
    pub value_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientResource {
    pub id: String,
    #[serde(default)]
    pub name: Vec<HumanName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(default)]
    pub given: Vec<String>,
    pub family: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum FHIRResource {
    Observation(ObservationResource),
    Patient(PatientResource),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleEntry {
    pub resource: FHIRResource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn from_resources(resources: Vec<FHIRResource>) -> Self {
        Bundle {
            entry: resources
                .into_iter()
                .map(|resource| BundleEntry { resource })
                .collect(),
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = &FHIRResource> {
        self.entry.iter().map(|e| &e.resource)
    }
}

fn quantity_value(quantity: &Option<Quantity>, text: &Option<String>) -> (Option<Value>, Option<String>) {
    match (quantity, text) {
        (Some(q), _) => (q.value.map(Value::Float), q.unit.clone().or_else(|| q.code.clone())),
        (None, Some(text)) => (Some(Value::String(text.clone())), None),
        (None, None) => (None, None),
    }
}

impl FHIRConverter for ObservationResource {
    fn to_observations(&self) -> Result<Vec<Observation>, FHIRError> {
        let label = self.id.as_deref().unwrap_or("<unidentified>");
        let patient_id = self
            .subject
            .as_ref()
            .and_then(Reference::patient_id)
            .ok_or_else(|| FHIRError::ValidationError(format!("Observation {} has no subject", label)))?;
        let timestamp = self.effective_date_time.clone().or_else(|| self.issued.clone());

        // Panels carry their measurements in components, one row each.
        if !self.component.is_empty() {
            return self
                .component
                .iter()
                .map(|component| {
                    let signal_name = component.code.signal_name().ok_or_else(|| {
                        FHIRError::ConversionError(format!("Observation {} has an uncoded component", label))
                    })?;
                    let (value, unit) = quantity_value(&component.value_quantity, &component.value_string);
                    Ok(Observation {
                        patient_id: patient_id.clone(),
                        timestamp: timestamp.clone(),
                        signal_name,
                        value,
                        unit,
                    })
                })
                .collect();
        }

        let signal_name = self
            .code
            .signal_name()
            .ok_or_else(|| FHIRError::ConversionError(format!("Observation {} has no code", label)))?;
        let (value, unit) = quantity_value(&self.value_quantity, &self.value_string);

        Ok(vec![Observation {
            patient_id,
            timestamp,
            signal_name,
            value,
            unit,
        }])
    }
}

impl From<&PatientResource> for PatientRecord {
    fn from(resource: &PatientResource) -> Self {
        let name = resource.name.first();
        PatientRecord {
            id: resource.id.clone(),
            first_name: name.and_then(|n| n.given.first().cloned()),
            last_name: name.and_then(|n| n.family.clone()),
        }
    }
}

impl FHIRConverter for Bundle {
    fn to_observations(&self) -> Result<Vec<Observation>, FHIRError> {
        let mut observations = Vec::new();
        for resource in self.resources() {
            if let FHIRResource::Observation(observation) = resource {
                observations.extend(observation.to_observations()?);
            }
        }
        Ok(observations)
    }

    fn to_patients(&self) -> Vec<PatientRecord> {
        self.resources()
            .filter_map(|resource| match resource {
                FHIRResource::Patient(patient) => Some(PatientRecord::from(patient)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"{
        "resourceType": "Bundle",
        "type": "collection",
        "entry": [
            {"resource": {"resourceType": "Patient", "id": "abc",
                "name": [{"given": ["Jacinto644"], "family": "Kris249"}]}},
            {"resource": {"resourceType": "Observation", "id": "o1", "status": "final",
                "subject": {"reference": "urn:uuid:abc"},
                "effectiveDateTime": "2019-02-16T04:25:51Z",
                "code": {"coding": [{"system": "http://loinc.org", "code": "8867-4", "display": "Heart rate"}]},
                "valueQuantity": {"value": 81.0, "unit": "/min"}}},
            {"resource": {"resourceType": "Observation", "id": "o2",
                "subject": {"reference": "Patient/abc"},
                "effectiveDateTime": "2019-02-16T04:25:51Z",
                "code": {"coding": [{"code": "85354-9", "display": "Blood pressure panel"}]},
                "component": [
                    {"code": {"coding": [{"code": "8462-4"}]}, "valueQuantity": {"value": 82, "unit": "mm[Hg]"}},
                    {"code": {"coding": [{"code": "8480-6"}]}, "valueQuantity": {"value": 131, "unit": "mm[Hg]"}}
                ]}},
            {"resource": {"resourceType": "Immunization", "id": "i1"}}
        ]
    }"#;

    #[test]
    fn test_bundle_to_observations() {
        let bundle: Bundle = serde_json::from_str(BUNDLE).unwrap();
        let observations = bundle.to_observations().unwrap();

        let names: Vec<&str> = observations.iter().map(|o| o.signal_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Heart rate", "Diastolic Blood Pressure", "Systolic Blood Pressure"]
        );
        assert!(observations.iter().all(|o| o.patient_id == "abc"));
        assert_eq!(observations[2].numeric_value(), Some(131.0));
        assert_eq!(observations[0].unit.as_deref(), Some("/min"));
    }

    #[test]
    fn test_bundle_to_patients() {
        let bundle: Bundle = serde_json::from_str(BUNDLE).unwrap();
        let patients = bundle.to_patients();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].display_name().as_deref(), Some("Jacinto Kris"));
    }

    #[test]
    fn test_observation_without_subject() {
        let resource: ObservationResource = serde_json::from_str(
            r#"{"id": "o9", "code": {"text": "Heart rate"}, "valueQuantity": {"value": 70}}"#,
        )
        .unwrap();
        assert!(matches!(resource.to_observations(), Err(FHIRError::ValidationError(_))));
    }

    #[test]
    fn test_string_value_kept_for_coercion() {
        let resource: ObservationResource = serde_json::from_str(
            r#"{"subject": {"reference": "Patient/p"}, "effectiveDateTime": "2020-01-01",
                "code": {"text": "Tobacco smoking status"}, "valueString": "Never smoker"}"#,
        )
        .unwrap();
        let rows = resource.to_observations().unwrap();
        assert_eq!(rows[0].value, Some(Value::String("Never smoker".to_string())));
        assert_eq!(rows[0].numeric_value(), None);
    }
}
