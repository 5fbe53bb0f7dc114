//! Move selection and frame ranges

use anyhow::Result;
use hashbrown::HashMap;

use super::AnimationError;
use crate::armature::{compile_filters, Armature};
use crate::scene::ActionData;

/// Which actions become moves.
#[derive(Debug, Clone, Default)]
pub struct MoveSelection {
    /// Action name filters, matched against the whole name. Empty selects every action.
    pub filters: Vec<String>,
    /// Export only this action.
    pub single: Option<String>,
}

/// Exportable actions matching the selection, in declaration order.
///
/// Fails if two selected actions export under the same move name.
pub fn select_actions<'a>(
    actions: &'a [ActionData],
    selection: &MoveSelection,
) -> Result<Vec<&'a ActionData>> {
    let patterns = if selection.filters.is_empty() {
        vec![".+".to_string()]
    } else {
        selection.filters.clone()
    };
    let filters = compile_filters(&patterns)?;

    let selected: Vec<&ActionData> = actions
        .iter()
        .filter(|action| action.export && !action.groups.is_empty())
        .filter(|action| match &selection.single {
            Some(single) => action.name == *single,
            None => true,
        })
        .filter(|action| filters.iter().any(|filter| filter.is_match(&action.name)))
        .collect();

    if let Some(single) = &selection.single {
        if selected.is_empty() {
            return Err(AnimationError::UnknownAction(single.clone()).into());
        }
    }

    let mut by_name: HashMap<&str, Vec<String>> = HashMap::new();
    for action in &selected {
        by_name
            .entry(action.move_name())
            .or_default()
            .push(action.name.clone());
    }
    for action in &selected {
        if let Some(actions) = by_name.get(action.move_name()).filter(|a| a.len() > 1) {
            return Err(AnimationError::DuplicateMoveName {
                name: action.move_name().to_string(),
                actions: actions.clone(),
            }
            .into());
        }
    }

    Ok(selected)
}

/// First and last frame sampled for a move.
///
/// Automatic ranges start at frame 0 and end at the latest keyframe (rounded half up)
/// of any retained bone, clipped to the playback range when the scene declares one.
pub fn frame_range(
    action: &ActionData,
    armature: &Armature,
    playback: Option<(i32, i32)>,
) -> (i32, i32) {
    if !action.automatic_range {
        return (action.first_frame, action.last_frame.max(action.first_frame));
    }

    let last = action
        .groups
        .iter()
        .filter(|group| armature.bone(&group.name).is_some())
        .flat_map(|group| group.keyframe_frames())
        .map(|frame| (frame + 0.5).floor() as i32)
        .fold(0, i32::max);

    match playback {
        Some((start, end)) => {
            let first = start.max(0);
            (first, last.min(end).max(first))
        }
        None => (0, last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::armature::resolve_armature;
    use crate::scene::{ActionGroupData, ArmatureData, BoneData, Keyframe};
    use glam::Vec3;

    fn action(name: &str, export_name: &str, frames: &[f32]) -> ActionData {
        ActionData {
            name: name.into(),
            export_name: export_name.into(),
            groups: vec![ActionGroupData {
                name: "root".into(),
                location: frames
                    .iter()
                    .map(|&frame| Keyframe { frame, value: Vec3::ZERO })
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn armature() -> Armature {
        let data = ArmatureData {
            name: "Armature".into(),
            bones: vec![BoneData {
                name: "root".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        resolve_armature(&data, &Configuration::default()).unwrap()
    }

    #[test]
    fn test_selection_filters_and_flags() {
        let mut hidden = action("hidden", "", &[0.0]);
        hidden.export = false;
        let mut empty = action("empty", "", &[]);
        empty.groups.clear();
        let actions = vec![
            action("walk", "", &[0.0]),
            action("run", "", &[0.0]),
            hidden,
            empty,
            action("walk_fast", "", &[0.0]),
        ];

        let all = select_actions(&actions, &MoveSelection::default()).unwrap();
        let names: Vec<_> = all.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["walk", "run", "walk_fast"]);

        let selection = MoveSelection {
            filters: vec!["walk".into()],
            single: None,
        };
        let walk = select_actions(&actions, &selection).unwrap();
        assert_eq!(walk.len(), 1);

        let single = MoveSelection {
            filters: Vec::new(),
            single: Some("run".into()),
        };
        assert_eq!(select_actions(&actions, &single).unwrap()[0].name, "run");
    }

    #[test]
    fn test_duplicate_move_names() {
        let actions = vec![action("walk", "", &[0.0]), action("walk.001", "walk", &[0.0])];
        let error = select_actions(&actions, &MoveSelection::default()).unwrap_err();
        assert_eq!(
            error.downcast_ref::<AnimationError>(),
            Some(&AnimationError::DuplicateMoveName {
                name: "walk".into(),
                actions: vec!["walk".into(), "walk.001".into()],
            })
        );
    }

    #[test]
    fn test_unknown_single_action() {
        let actions = vec![action("walk", "", &[0.0])];
        let selection = MoveSelection {
            filters: Vec::new(),
            single: Some("jump".into()),
        };
        assert!(select_actions(&actions, &selection).is_err());
    }

    #[test]
    fn test_automatic_range() {
        let armature = armature();
        let walk = action("walk", "", &[0.0, 9.6, 4.0]);
        assert_eq!(frame_range(&walk, &armature, None), (0, 10));
        assert_eq!(frame_range(&walk, &armature, Some((2, 8))), (2, 8));

        let mut manual = walk.clone();
        manual.automatic_range = false;
        manual.first_frame = 5;
        manual.last_frame = 20;
        assert_eq!(frame_range(&manual, &armature, Some((2, 8))), (5, 20));
    }
}
