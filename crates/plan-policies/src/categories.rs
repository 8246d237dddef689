//! Tabla cerrada `categoría de falla → instrucción fija`.
//!
//! Es lo único que entra textual al patch de reintento; las notas libres del
//! revisor nunca se copian.
use plan_domain::FailureCategory;

pub fn instruction_for(category: FailureCategory) -> &'static str {
    match category {
        FailureCategory::WrongRoom => "Render the room type exactly as labeled on the floor plan.",
        FailureCategory::ExtraFurniture => "Do not add furniture or objects that are not in the reference layout.",
        FailureCategory::StructuralChange => "Keep walls, doors and windows exactly where the floor plan places them.",
        FailureCategory::FlooringMismatch => "Use the flooring material and color from the approved style.",
        FailureCategory::PerspectiveDistortion => "Use a natural eye-level perspective with straight vertical lines.",
        FailureCategory::SeamArtifact => "Blend panorama edges so no seam or stitching line is visible.",
        FailureCategory::WrongCameraDirection => "Point the camera in the direction marked on the camera plan.",
        FailureCategory::StyleMismatch => "Match the palette and materials of the approved style reference.",
    }
}

/// Lleva una categoría libre (análisis, QA o revisor) a la tabla canónica.
/// Acepta el nombre canónico y alias habituales; lo desconocido es `None`.
pub fn normalize_category(raw: &str) -> Option<FailureCategory> {
    let norm: String = raw.trim()
                          .to_ascii_lowercase()
                          .chars()
                          .map(|c| if c == ' ' || c == '-' { '_' } else { c })
                          .collect();
    if let Ok(c) = norm.parse::<FailureCategory>() {
        return Some(c);
    }
    let category = match norm.as_str() {
        "room_type" | "room_type_violation" | "wrong_room_type" => FailureCategory::WrongRoom,
        "furniture" | "extra_objects" | "hallucinated_furniture" => FailureCategory::ExtraFurniture,
        "structural" | "structural_violation" | "walls" | "layout_change" => FailureCategory::StructuralChange,
        "flooring" | "floor" | "floor_material" => FailureCategory::FlooringMismatch,
        "perspective" | "distortion" | "warped_perspective" => FailureCategory::PerspectiveDistortion,
        "seam" | "seams" | "stitching" | "stitching_artifact" => FailureCategory::SeamArtifact,
        "camera_direction" | "wrong_direction" | "camera" => FailureCategory::WrongCameraDirection,
        "style" | "style_drift" | "palette" => FailureCategory::StyleMismatch,
        _ => return None,
    };
    Some(category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_a_distinct_instruction() {
        let mut seen = std::collections::HashSet::new();
        for c in FailureCategory::ALL {
            assert!(seen.insert(instruction_for(c)), "{c} repite instrucción");
        }
    }

    #[test]
    fn aliases_normalize() {
        assert_eq!(normalize_category("Wrong Room"), Some(FailureCategory::WrongRoom));
        assert_eq!(normalize_category(" seam-artifact "), Some(FailureCategory::SeamArtifact));
        assert_eq!(normalize_category("stitching"), Some(FailureCategory::SeamArtifact));
        assert_eq!(normalize_category("Structural"), Some(FailureCategory::StructuralChange));
        assert_eq!(normalize_category("lighting"), None);
        assert_eq!(normalize_category(""), None);
    }
}
