use std::fmt::{self, Display, Formatter};

use crate::skeleton::{BindPose, FlatSkeleton};

const CLASS_VERSION: u32 = 8;
const CONTENTS_VERSION: &str = "hk_2010.2.0-r1";
const INDENT: &str = "    ";

const ROOT_LEVEL_CONTAINER: (&str, &str) = ("hkRootLevelContainer", "0x2772c11e");

pub fn strip_hkx_extension(file_name: &str) -> &str {
    file_name.strip_suffix(".hkx").unwrap_or(file_name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    /// Havok's empty string marker
    NullString,
    Vector([f32; 4]),
    Struct(Box<HkObject>),
    Array(Array),
}

impl ParamValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn empty_array() -> Self {
        Self::Array(Array::Tokens(Vec::new()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Tokens(Vec<String>),
    CStrings(Vec<String>),
    Lines(Vec<String>),
    Objects(Vec<HkObject>),
}

impl Array {
    pub fn len(&self) -> usize {
        match self {
            Self::Tokens(values) | Self::CStrings(values) | Self::Lines(values) => values.len(),
            Self::Objects(objects) => objects.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Param { name: &'static str, value: ParamValue },
    /// Fields the format doesn't serialize, kept as comments
    Ignored(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HkObject {
    /// `(name, class, signature)` for top-level objects, `None` for inline ones
    header: Option<(String, &'static str, &'static str)>,
    members: Vec<Member>,
}

impl HkObject {
    pub fn new(name: &str, class: &'static str, signature: &'static str) -> Self {
        Self {
            header: Some((name.to_string(), class, signature)),
            members: Vec::new(),
        }
    }

    pub const fn inline() -> Self {
        Self {
            header: None,
            members: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: ParamValue) -> Self {
        self.members.push(Member::Param { name, value });
        self
    }

    pub fn text(self, name: &'static str, value: impl Into<String>) -> Self {
        self.param(name, ParamValue::text(value))
    }

    pub fn array(self, name: &'static str, array: Array) -> Self {
        self.param(name, ParamValue::Array(array))
    }

    pub fn empty_arrays(self, names: &[&'static str]) -> Self {
        names.iter().fold(self, |object, &name| object.param(name, ParamValue::empty_array()))
    }

    pub fn ignored(mut self, name: &'static str) -> Self {
        self.members.push(Member::Ignored(name));
        self
    }

    /// Adds the reference-counting fields every `hkReferencedObject` carries.
    pub fn referenced(self) -> Self {
        self.ignored("memSizeAndFlags").ignored("referenceCount")
    }

    fn write(&self, f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = INDENT.repeat(depth);
        match &self.header {
            Some((name, class, signature)) => {
                writeln!(f, "{indent}<hkobject name=\"{name}\" class=\"{class}\" signature=\"{signature}\">")?
            }
            None => writeln!(f, "{indent}<hkobject>")?,
        }

        let inner = INDENT.repeat(depth + 1);
        for member in &self.members {
            match member {
                Member::Ignored(name) => writeln!(f, "{inner}<!-- {name} SERIALIZE_IGNORED -->")?,
                Member::Param { name, value } => write_param(f, depth + 1, name, value)?,
            }
        }

        writeln!(f, "{indent}</hkobject>")
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn write_param(f: &mut Formatter<'_>, depth: usize, name: &str, value: &ParamValue) -> fmt::Result {
    let indent = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);
    match value {
        ParamValue::Text(text) => writeln!(f, "{indent}<hkparam name=\"{name}\">{}</hkparam>", escape(text)),
        ParamValue::NullString => writeln!(f, "{indent}<hkparam name=\"{name}\">&#9216;</hkparam>"),
        ParamValue::Vector([x, y, z, w]) => {
            writeln!(f, "{indent}<hkparam name=\"{name}\">({x:.6} {y:.6} {z:.6} {w:.6})</hkparam>")
        }
        ParamValue::Struct(object) => {
            writeln!(f, "{indent}<hkparam name=\"{name}\">")?;
            object.write(f, depth + 1)?;
            writeln!(f, "{indent}</hkparam>")
        }
        ParamValue::Array(array) if array.is_empty() => {
            writeln!(f, "{indent}<hkparam name=\"{name}\" numelements=\"0\"></hkparam>")
        }
        ParamValue::Array(array) => {
            writeln!(f, "{indent}<hkparam name=\"{name}\" numelements=\"{}\">", array.len())?;
            match array {
                Array::Tokens(values) => {
                    let line = values.iter().map(|value| escape(value)).collect::<Vec<_>>().join(" ");
                    writeln!(f, "{inner}{line}")?;
                }
                Array::CStrings(values) => {
                    for value in values {
                        writeln!(f, "{inner}<hkcstring>{}</hkcstring>", escape(value))?;
                    }
                }
                Array::Lines(lines) => {
                    for line in lines {
                        writeln!(f, "{inner}{line}")?;
                    }
                }
                Array::Objects(objects) => {
                    for object in objects {
                        object.write(f, depth + 1)?;
                    }
                }
            }
            writeln!(f, "{indent}</hkparam>")
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackfileDocument {
    top_level: String,
    objects: Vec<HkObject>,
}

impl PackfileDocument {
    pub fn new(top_level: &str) -> Self {
        Self {
            top_level: top_level.to_string(),
            objects: Vec::new(),
        }
    }

    pub fn object(mut self, object: HkObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn root_level_container(self, name: &str, variants: &[(&str, &str, &str)]) -> Self {
        let variants = variants
            .iter()
            .map(|&(variant_name, class_name, variant)| {
                HkObject::inline()
                    .text("name", variant_name)
                    .text("className", class_name)
                    .text("variant", variant)
            })
            .collect();
        let (class, signature) = ROOT_LEVEL_CONTAINER;
        self.object(HkObject::new(name, class, signature).array("namedVariants", Array::Objects(variants)))
    }
}

impl Display for PackfileDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "<?xml version=\"1.0\" encoding=\"ascii\"?>")?;
        writeln!(
            f,
            "<hkpackfile classversion=\"{CLASS_VERSION}\" contentsversion=\"{CONTENTS_VERSION}\" toplevelobject=\"{}\">",
            self.top_level
        )?;
        writeln!(f)?;
        writeln!(f, "{INDENT}<hksection name=\"__data__\">")?;
        writeln!(f)?;
        for object in &self.objects {
            object.write(f, 2)?;
            writeln!(f)?;
        }
        writeln!(f, "{INDENT}</hksection>")?;
        writeln!(f)?;
        f.write_str("</hkpackfile>\n")
    }
}

pub fn render_skeleton(skeleton: &FlatSkeleton, bind_pose: &BindPose, skeleton_name: &str) -> String {
    let parent_indices = skeleton.parent_indices().map(|index| index.to_string()).collect();

    let bones = skeleton
        .iter()
        .map(|flat| {
            HkObject::inline()
                .text("name", flat.bone.name.as_str())
                .text("lockTranslation", "true")
        })
        .collect();

    let reference_pose = skeleton
        .iter()
        .map(|flat| {
            let bind = bind_pose.bind_transform(flat.bone);
            let t = bind.translation;
            let r = bind.rotation;
            let s = bind.scale;
            format!(
                "({:.6}, {:.6}, {:.6})({:.6}, {:.6}, {:.6}, {:.6})({:.6}, {:.6}, {:.6})",
                t.x, t.y, t.z, r.w, r.i, r.j, r.k, s.x, s.y, s.z
            )
        })
        .collect();

    let resources = HkObject::new("#0045", "hkMemoryResourceContainer", "0x4762f92a")
        .referenced()
        .text("name", "")
        .ignored("parent")
        .empty_arrays(&["resourceHandles", "children"]);

    let hk_skeleton = HkObject::new("#0046", "hkaSkeleton", "0x366e8220")
        .referenced()
        .text("name", strip_hkx_extension(skeleton_name))
        .array("parentIndices", Array::Tokens(parent_indices))
        .array("bones", Array::Objects(bones))
        .array("referencePose", Array::Lines(reference_pose))
        .empty_arrays(&["referenceFloats", "floatSlots", "localFrames"]);

    let container = HkObject::new("#0047", "hkaAnimationContainer", "0x8dc20333")
        .referenced()
        .array("skeletons", Array::Tokens(vec!["#0046".to_string()]))
        .empty_arrays(&["animations", "bindings", "attachments", "skins"]);

    PackfileDocument::new("#0044")
        .object(resources)
        .object(hk_skeleton)
        .object(container)
        .root_level_container(
            "#0044",
            &[
                ("Merged Animation Container", "hkaAnimationContainer", "#0047"),
                ("Resource Data", "hkMemoryResourceContainer", "#0045"),
            ],
        )
        .to_string()
}

/// Renders a behavior character referencing the rig and behavior by relative path. The
/// character controller values are engine defaults, not scene data.
pub fn render_character(character_name: &str, skeleton_ref: &str, behavior_ref: &str) -> String {
    let mirrored_skeleton = HkObject::new("#0023", "hkbMirroredSkeletonInfo", "0xc6c2da4f")
        .referenced()
        .param("mirrorAxis", ParamValue::Vector([1.0, 0.0, 0.0, 0.0]))
        .empty_arrays(&["bonePairMap"]);

    let string_data = HkObject::new("#0024", "hkbCharacterStringData", "0x655b42bc")
        .referenced()
        .empty_arrays(&[
            "deformableSkinNames",
            "rigidSkinNames",
            "animationNames",
            "animationFilenames",
            "characterPropertyNames",
            "retargetingSkeletonMapperFilenames",
            "lodNames",
            "mirroredSyncPointSubstringsA",
            "mirroredSyncPointSubstringsB",
        ])
        .text("name", strip_hkx_extension(character_name))
        .text("rigName", format!("CharacterAssets\\{skeleton_ref}"))
        .param("ragdollName", ParamValue::NullString)
        .text("behaviorFilename", format!("Behaviors\\{behavior_ref}"));

    let property_values = HkObject::new("#0025", "hkbVariableValueSet", "0x27812d8d")
        .referenced()
        .empty_arrays(&["wordVariableValues", "quadVariableValues", "variantVariableValues"]);

    let controller_info = HkObject::inline()
        .text("capsuleHeight", format!("{:.6}", 1.7))
        .text("capsuleRadius", format!("{:.6}", 0.4))
        .text("collisionFilterInfo", "1")
        .text("characterControllerCinfo", "null");

    let character_data = HkObject::new("#0026", "hkbCharacterData", "0x300d6808")
        .referenced()
        .param("characterControllerInfo", ParamValue::Struct(Box::new(controller_info)))
        .param("modelUpMS", ParamValue::Vector([0.0, 0.0, 0.0, 1.0]))
        .param("modelForwardMS", ParamValue::Vector([1.0, 0.0, 0.0, 0.0]))
        .param("modelRightMS", ParamValue::Vector([-0.0, -1.0, -0.0, 0.0]))
        .empty_arrays(&["characterPropertyInfos", "numBonesPerLod"])
        .text("characterPropertyValues", "#0025")
        .text("footIkDriverInfo", "null")
        .text("handIkDriverInfo", "null")
        .text("stringData", "#0024")
        .text("mirroredSkeletonInfo", "#0023")
        .text("scale", format!("{:.6}", 1.0))
        .ignored("numHands")
        .ignored("numFloatSlots");

    PackfileDocument::new("#0022")
        .object(mirrored_skeleton)
        .object(string_data)
        .object(property_values)
        .object(character_data)
        .root_level_container("#0022", &[("hkbCharacterData", "hkbCharacterData", "#0026")])
        .to_string()
}

pub fn render_project(character_ref: &str) -> String {
    let string_data = HkObject::new("#0009", "hkbProjectStringData", "0x76ad60a")
        .referenced()
        .empty_arrays(&["animationFilenames", "behaviorFilenames"])
        .array("characterFilenames", Array::CStrings(vec![format!("Characters\\{character_ref}")]))
        .empty_arrays(&["eventNames"])
        .text("animationPath", "")
        .text("behaviorPath", "")
        .text("characterPath", "")
        .text("fullPathToSource", "")
        .ignored("rootPath");

    let project_data = HkObject::new("#0010", "hkbProjectData", "0x13a39ba7")
        .referenced()
        .param("worldUpWS", ParamValue::Vector([0.0, 0.0, 1.0, 0.0]))
        .text("stringData", "#0009")
        .text("defaultEventMode", "EVENT_MODE_IGNORE_FROM_GENERATOR");

    PackfileDocument::new("#0008")
        .object(string_data)
        .object(project_data)
        .root_level_container("#0008", &[("hkbProjectData", "hkbProjectData", "#0010")])
        .to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::axis::Axis;
    use crate::scene::{Armature, Bone, RestTransform};
    use crate::skeleton::skip_ik_bones;

    fn armature() -> Armature {
        Armature {
            name: "Armature".to_string(),
            axis_forward: Axis::Y,
            axis_up: Axis::Z,
            bones: vec![
                Bone::new("Root", None),
                Bone::new("Spine", Some("Root")).with_rest(RestTransform {
                    translation: [0.0, 0.0, 1.5],
                    ..RestTransform::default()
                }),
                Bone::new("IK_Hand", Some("Spine")),
                Bone::new("Head", Some("Spine")),
            ],
            action: None,
        }
    }

    /// Extracts the `numelements` attribute of the named parameter.
    fn numelements(xml: &str, param: &str) -> usize {
        let needle = format!("<hkparam name=\"{param}\" numelements=\"");
        let start = xml.find(&needle).unwrap() + needle.len();
        let end = start + xml[start..].find('"').unwrap();
        xml[start..end].parse().unwrap()
    }

    #[test]
    fn skeleton_counts_match() {
        let armature = armature();
        let skeleton = FlatSkeleton::flatten(&armature.bones, skip_ik_bones(true));
        let bind_pose = BindPose::new(&armature).unwrap();
        let xml = render_skeleton(&skeleton, &bind_pose, "skeleton.hkx");

        assert_eq!(numelements(&xml, "parentIndices"), 3);
        assert_eq!(numelements(&xml, "bones"), 3);
        assert_eq!(numelements(&xml, "referencePose"), 3);
        assert_eq!(xml.matches("<hkparam name=\"lockTranslation\">true</hkparam>").count(), 3);
        assert!(xml.contains("<hkparam name=\"name\">skeleton</hkparam>"));
        assert!(!xml.contains("IK_Hand"));
    }

    #[test]
    fn skeleton_layout() {
        let armature = armature();
        let skeleton = FlatSkeleton::flatten(&armature.bones, skip_ik_bones(true));
        let bind_pose = BindPose::new(&armature).unwrap();
        let xml = render_skeleton(&skeleton, &bind_pose, "skeleton.hkx");

        let expected_skeleton = r##"        <hkobject name="#0046" class="hkaSkeleton" signature="0x366e8220">
            <!-- memSizeAndFlags SERIALIZE_IGNORED -->
            <!-- referenceCount SERIALIZE_IGNORED -->
            <hkparam name="name">skeleton</hkparam>
            <hkparam name="parentIndices" numelements="3">
                -1 0 1
            </hkparam>
            <hkparam name="bones" numelements="3">
                <hkobject>
                    <hkparam name="name">Root</hkparam>
                    <hkparam name="lockTranslation">true</hkparam>
                </hkobject>
                <hkobject>
                    <hkparam name="name">Spine</hkparam>
                    <hkparam name="lockTranslation">true</hkparam>
                </hkobject>
                <hkobject>
                    <hkparam name="name">Head</hkparam>
                    <hkparam name="lockTranslation">true</hkparam>
                </hkobject>
            </hkparam>
            <hkparam name="referencePose" numelements="3">
                (0.000000, 0.000000, 0.000000)(1.000000, 0.000000, 0.000000, 0.000000)(1.000000, 1.000000, 1.000000)
                (0.000000, 0.000000, 1.500000)(1.000000, 0.000000, 0.000000, 0.000000)(1.000000, 1.000000, 1.000000)
                (0.000000, 0.000000, -1.500000)(1.000000, 0.000000, 0.000000, 0.000000)(1.000000, 1.000000, 1.000000)
            </hkparam>
            <hkparam name="referenceFloats" numelements="0"></hkparam>
            <hkparam name="floatSlots" numelements="0"></hkparam>
            <hkparam name="localFrames" numelements="0"></hkparam>
        </hkobject>
"##;
        assert!(xml.starts_with(
            "<?xml version=\"1.0\" encoding=\"ascii\"?>\n<hkpackfile classversion=\"8\" contentsversion=\"hk_2010.2.0-r1\" toplevelobject=\"#0044\">\n"
        ));
        assert!(xml.contains(expected_skeleton), "{xml}");
        assert!(xml.ends_with("    </hksection>\n\n</hkpackfile>\n"));
    }

    #[test]
    fn project_references_character_file() {
        let xml = render_project("hero.hkx");
        assert!(xml.contains(
            "            <hkparam name=\"characterFilenames\" numelements=\"1\">\n                <hkcstring>Characters\\hero.hkx</hkcstring>\n            </hkparam>\n"
        ));
        assert!(xml.contains("<hkparam name=\"worldUpWS\">(0.000000 0.000000 1.000000 0.000000)</hkparam>"));
        assert!(xml.contains("toplevelobject=\"#0008\""));
    }

    #[test]
    fn character_references_rig_and_behavior() {
        let xml = render_character("hero.hkx", "skeleton.hkx", "behavior.hkx");
        assert!(xml.contains("<hkparam name=\"name\">hero</hkparam>"));
        assert!(xml.contains("<hkparam name=\"rigName\">CharacterAssets\\skeleton.hkx</hkparam>"));
        assert!(xml.contains("<hkparam name=\"behaviorFilename\">Behaviors\\behavior.hkx</hkparam>"));
        assert!(xml.contains("<hkparam name=\"ragdollName\">&#9216;</hkparam>"));
        assert!(xml.contains("<hkparam name=\"modelRightMS\">(-0.000000 -1.000000 -0.000000 0.000000)</hkparam>"));
        assert!(xml.contains(
            "            <hkparam name=\"characterControllerInfo\">\n                <hkobject>\n                    <hkparam name=\"capsuleHeight\">1.700000</hkparam>\n"
        ));
    }

    #[test]
    fn rendering_is_stable() {
        assert_eq!(render_character("a.hkx", "b.hkx", "c.hkx"), render_character("a.hkx", "b.hkx", "c.hkx"));
        assert_eq!(render_project("a.hkx"), render_project("a.hkx"));
    }

    #[test]
    fn text_is_escaped() {
        let document = PackfileDocument::new("#0001").object(HkObject::new("#0001", "hkClass", "0x0").text("name", "a<b & \"c\""));
        assert!(document.to_string().contains("<hkparam name=\"name\">a&lt;b &amp; &quot;c&quot;</hkparam>"));
    }

    #[test]
    fn numelements_follow_content() {
        let object = HkObject::new("#0001", "hkClass", "0x0")
            .array("tokens", Array::Tokens(vec!["1".into(), "2".into()]))
            .array("strings", Array::CStrings(vec!["x".into()]))
            .array("empty", Array::Lines(Vec::new()));
        let xml = PackfileDocument::new("#0001").object(object).to_string();
        assert_eq!(numelements(&xml, "tokens"), 2);
        assert_eq!(numelements(&xml, "strings"), 1);
        assert!(xml.contains("<hkparam name=\"empty\" numelements=\"0\"></hkparam>"));
    }

    #[test]
    fn strips_extension() {
        assert_eq!(strip_hkx_extension("skeleton.hkx"), "skeleton");
        assert_eq!(strip_hkx_extension("skeleton"), "skeleton");
    }
}
