/*
    engine.rs - Promotion and demotion along a track

    A user's position on a track is found from their membership nodes: the one
    track group they hold a `group.<name>` node for. Planning is pure; applying
    a plan validates the primary-group guard before touching the node set, so a
    rejected move leaves the user unchanged.
*/

use crate::model::{normalize_context, NodeKey, PermissionHolder, Track, TrackError, User};

/// Outcome of a promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// The user was not on the track and joined its first group
    Joined { group: String, context: Option<String> },
    /// The user moved one step up
    Moved {
        from: String,
        to: String,
        context: Option<String>,
    },
}

/// Outcome of a demotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Demotion {
    /// The user moved one step down
    Moved {
        from: String,
        to: String,
        context: Option<String>,
    },
    /// The user was on the first group and left the track
    Removed { from: String, context: Option<String> },
}

/// (group, node context) of the user's single membership on the track
fn position(
    user: &User,
    track: &Track,
    context: Option<&str>,
) -> Result<Option<(String, Option<String>)>, TrackError> {
    if track.is_empty() {
        return Err(TrackError::Empty {
            track: track.name().to_string(),
        });
    }

    let filter = normalize_context(context);
    let candidates: Vec<(String, Option<String>)> = user
        .nodes()
        .iter()
        .filter(|node| node.is_membership())
        .filter(|node| filter.is_none() || node.context == filter)
        .filter_map(|node| {
            node.group_name()
                .filter(|group| track.contains(group))
                .map(|group| (group.to_string(), node.context.clone()))
        })
        .collect();

    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.into_iter().next()),
        _ => Err(TrackError::Ambiguous {
            track: track.name().to_string(),
            groups: candidates.into_iter().map(|(group, _)| group).collect(),
        }),
    }
}

pub fn plan_promotion(
    user: &User,
    track: &Track,
    context: Option<&str>,
) -> Result<Promotion, TrackError> {
    match position(user, track, context)? {
        None => Ok(Promotion::Joined {
            group: track.groups()[0].clone(),
            context: normalize_context(context),
        }),
        Some((from, context)) => match track.next(&from) {
            Some(to) => Ok(Promotion::Moved {
                to: to.to_string(),
                from,
                context,
            }),
            None => Err(TrackError::AlreadyAtTopOfTrack {
                track: track.name().to_string(),
            }),
        },
    }
}

pub fn plan_demotion(
    user: &User,
    track: &Track,
    context: Option<&str>,
) -> Result<Demotion, TrackError> {
    let (from, context) = position(user, track, context)?.ok_or_else(|| TrackError::NotOnTrack {
        track: track.name().to_string(),
    })?;

    match track.previous(&from) {
        Some(to) => Ok(Demotion::Moved {
            to: to.to_string(),
            from,
            context,
        }),
        None if context.is_none() && user.primary_group() == from => {
            Err(TrackError::AlreadyAtBottomOfTrack {
                track: track.name().to_string(),
            })
        }
        None => Ok(Demotion::Removed { from, context }),
    }
}

/// Swap membership `from` for `to`, keeping the node's context.
///
/// When `from` is the unscoped primary group, the primary group follows the move.
fn move_membership(
    user: &mut User,
    from: &str,
    to: &str,
    context: Option<&str>,
) -> Result<(), TrackError> {
    let old = NodeKey::group(from, context);
    let carries_primary = context.is_none() && user.primary_group() == from;
    if !carries_primary {
        user.check_unset(&old)?;
    }

    user.add_group(to, context);
    if carries_primary {
        user.set_primary_group(to)?;
    }
    user.unset_node(&old)?;
    Ok(())
}

pub fn apply_promotion(user: &mut User, promotion: &Promotion) -> Result<(), TrackError> {
    match promotion {
        Promotion::Joined { group, context } => {
            user.add_group(group, context.as_deref());
            Ok(())
        }
        Promotion::Moved { from, to, context } => {
            move_membership(user, from, to, context.as_deref())
        }
    }
}

pub fn apply_demotion(user: &mut User, demotion: &Demotion) -> Result<(), TrackError> {
    match demotion {
        Demotion::Moved { from, to, context } => {
            move_membership(user, from, to, context.as_deref())
        }
        Demotion::Removed { from, context } => {
            user.remove_group(from, context.as_deref())?;
            Ok(())
        }
    }
}

/// Plan and apply a promotion
pub fn promote(user: &mut User, track: &Track, context: Option<&str>) -> Result<Promotion, TrackError> {
    let promotion = plan_promotion(user, track, context)?;
    apply_promotion(user, &promotion)?;
    Ok(promotion)
}

/// Plan and apply a demotion
pub fn demote(user: &mut User, track: &Track, context: Option<&str>) -> Result<Demotion, TrackError> {
    let demotion = plan_demotion(user, track, context)?;
    apply_demotion(user, &demotion)?;
    Ok(demotion)
}
