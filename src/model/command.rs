use serde::{Deserialize, Serialize};

use super::resources::Resources;
use crate::error::{Error, Result};

/// Action tags, as accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    Wait,
    Attack,
    Defend,
    Disband,
}

string_enum!(ActionKind {
    Move => "move",
    Wait => "wait",
    Attack => "attack",
    Defend => "defend",
    Disband => "disband",
});

/// Delivered to the city found at the destination of a `move`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveArgs {
    /// Resources handed over from the army's stock.
    pub amount: Resources,
    /// Units handed over from the army.
    pub units: Vec<String>,
    /// The amount is tax owed to the destination.
    pub tax: bool,
}

impl MoveArgs {
    pub fn is_empty(&self) -> bool {
        self.amount.is_zero() && self.units.is_empty()
    }
}

/// Effects an `attack` has on the target city if the attackers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssaultArgs {
    /// Become the overlord of the target.
    pub overlord: bool,
    /// Destroy one finished building of the target.
    pub break_building: bool,
    /// Cut the target's next production round.
    pub massacre: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args", rename_all = "lowercase")]
pub enum Action {
    Move(MoveArgs),
    Wait,
    Attack(AssaultArgs),
    Defend,
    Disband,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Move(_) => ActionKind::Move,
            Action::Wait => ActionKind::Wait,
            Action::Attack(_) => ActionKind::Attack,
            Action::Defend => ActionKind::Defend,
            Action::Disband => ActionKind::Disband,
        }
    }

    /// Build an action from its wire tag and optional JSON arguments.
    /// Absent or empty arguments mean defaults.
    pub fn parse(tag: &str, args: Option<&str>) -> Result<Action> {
        let kind: ActionKind = tag.parse().map_err(Error::InvalidArgument)?;
        let args = args.map(str::trim).filter(|a| !a.is_empty());
        let decode = |raw: &str| -> Result<serde_json::Value> {
            serde_json::from_str(raw)
                .map_err(|e| Error::InvalidArgument(format!("{kind} arguments: {e}")))
        };
        let action = match kind {
            ActionKind::Move => Action::Move(match args {
                Some(raw) => serde_json::from_value(decode(raw)?)
                    .map_err(|e| Error::InvalidArgument(format!("{kind} arguments: {e}")))?,
                None => MoveArgs::default(),
            }),
            ActionKind::Attack => Action::Attack(match args {
                Some(raw) => serde_json::from_value(decode(raw)?)
                    .map_err(|e| Error::InvalidArgument(format!("{kind} arguments: {e}")))?,
                None => AssaultArgs::default(),
            }),
            ActionKind::Wait => Action::Wait,
            ActionKind::Defend => Action::Defend,
            ActionKind::Disband => Action::Disband,
        };
        if let (Some(raw), ActionKind::Wait | ActionKind::Defend | ActionKind::Disband) =
            (args, kind)
        {
            decode(raw)?;
        }
        Ok(action)
    }
}

/// One queued order: go to `cell`, then do `action` there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub cell: u64,
    #[serde(flatten)]
    pub action: Action,
}

impl Command {
    pub fn new(cell: u64, action: Action) -> Self {
        Self { cell, action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn commands_serialize_with_tag_and_args() {
        let cmd = Command::new(
            4,
            Action::Attack(AssaultArgs {
                massacre: true,
                ..AssaultArgs::default()
            }),
        );
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["cell"], 4);
        assert_eq!(json["action"], "attack");
        assert_eq!(json["args"]["massacre"], true);
        let back: Command = serde_json::from_value(json).unwrap();
        assert_eq!(back, cmd);

        let wait: Command = serde_json::from_str(r#"{"cell": 2, "action": "wait"}"#).unwrap();
        assert_eq!(wait.action, Action::Wait);
    }

    #[test]
    fn parse_accepts_known_tags() {
        assert_eq!(Action::parse("wait", None).unwrap(), Action::Wait);
        assert_eq!(Action::parse("disband", Some("  ")).unwrap(), Action::Disband);
        let mv = Action::parse("move", Some(r#"{"amount": [0, 5, 0, 0, 0, 0]}"#)).unwrap();
        match mv {
            Action::Move(args) => assert_eq!(args.amount.0[1], 5),
            other => panic!("unexpected {other:?}"),
        }
        let atk = Action::parse("attack", Some(r#"{"overlord": true}"#)).unwrap();
        assert_eq!(atk.kind(), ActionKind::Attack);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(Action::parse("dance", None).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            Action::parse("move", Some("{not json")).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Action::parse("attack", Some(r#"{"overlord": "yes"}"#)).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(Action::parse("wait", Some("[")).is_err());
    }
}
