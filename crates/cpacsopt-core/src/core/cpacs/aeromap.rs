use super::{AEROPERFORMANCE_XPATH, CpacsDocument, CpacsError, Node};
use phf::{Set, phf_set};

/// Flight-condition vectors that define an aeromap; everything else under
/// `aeroPerformanceMap` is a computed coefficient.
static AEROMAP_PARAMETERS: Set<&'static str> = phf_set! {
    "altitude", "machNumber", "angleOfAttack", "angleOfSideslip",
};

pub fn aeromap_xpath(uid: &str) -> String {
    format!("{}/aeroMap[@uID=\"{}\"]", AEROPERFORMANCE_XPATH, uid)
}

pub fn is_parameter(name: &str) -> bool {
    AEROMAP_PARAMETERS.contains(name)
}

/// Clears the coefficients of an aeromap while keeping its flight conditions.
///
/// Analysis modules append to the coefficient vectors instead of overwriting
/// them, so results from a previous iteration must be removed before the next
/// module chain runs. Returns the removed `(name, value)` pairs, in document
/// order, or `None` if the aeromap does not exist.
pub fn reset_coefficients(
    doc: &mut CpacsDocument,
    uid: &str,
) -> Result<Option<Vec<(String, String)>>, CpacsError> {
    let map_xpath = format!("{}/aeroPerformanceMap", aeromap_xpath(uid));
    let Some(map) = doc.element_mut(&map_xpath)? else {
        return Ok(None);
    };

    let mut removed = Vec::new();
    map.children.retain(|node| match node {
        Node::Element(child) if !is_parameter(child.local_name()) => {
            removed.push((child.local_name().to_string(), child.text()));
            false
        }
        _ => true,
    });
    Ok(Some(removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_AEROMAP: &str = r#"<cpacs>
  <vehicles><aircraft><model><analyses><aeroPerformance>
    <aeroMap uID="test_optim">
      <name>test_optim</name>
      <aeroPerformanceMap>
        <altitude>0;1000</altitude>
        <machNumber>0.3;0.4</machNumber>
        <angleOfAttack>2;2</angleOfAttack>
        <angleOfSideslip>0;0</angleOfSideslip>
        <cl>0.41;0.43</cl>
        <cd>0.021;0.022</cd>
        <cms>-0.01;-0.02</cms>
      </aeroPerformanceMap>
    </aeroMap>
  </aeroPerformance></analyses></model></aircraft></vehicles>
</cpacs>"#;

    #[test]
    fn reset_keeps_parameters_and_drops_coefficients() {
        let mut doc = CpacsDocument::parse_str(WITH_AEROMAP).unwrap();

        let removed = reset_coefficients(&mut doc, "test_optim")
            .unwrap()
            .unwrap();

        let names: Vec<_> = removed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["cl", "cd", "cms"]);
        assert_eq!(removed[0].1, "0.41;0.43");

        let base = format!("{}/aeroPerformanceMap", aeromap_xpath("test_optim"));
        assert_eq!(
            doc.get_text(&format!("{}/machNumber", base))
                .unwrap()
                .as_deref(),
            Some("0.3;0.4")
        );
        assert!(!doc.exists(&format!("{}/cl", base)).unwrap());
        assert_eq!(
            doc.get_text(&format!("{}/name", aeromap_xpath("test_optim")))
                .unwrap()
                .as_deref(),
            Some("test_optim")
        );
    }

    #[test]
    fn reset_of_unknown_aeromap_is_a_no_op() {
        let mut doc = CpacsDocument::parse_str(WITH_AEROMAP).unwrap();
        let before = doc.clone();
        assert_eq!(reset_coefficients(&mut doc, "other").unwrap(), None);
        assert_eq!(doc, before);
    }

    #[test]
    fn parameter_names_are_recognized() {
        assert!(is_parameter("altitude"));
        assert!(is_parameter("angleOfSideslip"));
        assert!(!is_parameter("cl"));
    }
}
