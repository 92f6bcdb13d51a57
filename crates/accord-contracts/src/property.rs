//! Property registry rules.

use accord_types::RecordKind;

use crate::shape::{
    no_inputs, no_outputs, one_input, one_output, output_participants_signed, some_inputs,
    some_outputs,
};
use crate::{Rule, TxView};

pub const KIND: &str = "All records must belong to the property contract.";

pub const REGISTER_NO_INPUTS: &str = "No inputs should be consumed when registering a property.";
pub const REGISTER_ONE_OUTPUT: &str =
    "Only one output state should be created when registering a property.";
pub const REGISTER_ADDRESS: &str = "The property address cannot be empty.";
pub const REGISTER_PARTICIPANTS: &str = "A property must have at least one participant.";
pub const REGISTER_SIGNER: &str = "The property manager must be the signer.";

pub const CHANGE_MANAGER_INPUTS: &str =
    "At least one input should be consumed when changing the property manager.";
pub const CHANGE_MANAGER_OUTPUTS: &str =
    "At least one output should be created when changing the property manager.";
pub const CHANGE_MANAGER_SIGNERS: &str =
    "All output participants are required to sign when changing the property manager.";

pub const DEREGISTER_ONE_INPUT: &str =
    "Only one input should be consumed when deregistering a property.";
pub const DEREGISTER_NO_OUTPUTS: &str =
    "Zero outputs should be created when deregistering a property.";

pub(crate) const KIND_RULE: Rule = Rule::new(KIND, all_properties);

pub(crate) const REGISTER: &[Rule] = &[
    Rule::new(REGISTER_NO_INPUTS, no_inputs),
    Rule::new(REGISTER_ONE_OUTPUT, one_output),
    Rule::new(REGISTER_ADDRESS, address_present),
    Rule::new(REGISTER_PARTICIPANTS, has_participants),
    Rule::new(REGISTER_SIGNER, output_participants_signed),
];

pub(crate) const CHANGE_MANAGER: &[Rule] = &[
    Rule::new(CHANGE_MANAGER_INPUTS, some_inputs),
    Rule::new(CHANGE_MANAGER_OUTPUTS, some_outputs),
    Rule::new(CHANGE_MANAGER_SIGNERS, output_participants_signed),
];

pub(crate) const DEREGISTER: &[Rule] = &[
    Rule::new(DEREGISTER_ONE_INPUT, one_input),
    Rule::new(DEREGISTER_NO_OUTPUTS, no_outputs),
];

fn all_properties(tx: &TxView<'_>) -> bool {
    tx.all_records().all(|r| r.kind() == RecordKind::Property)
}

fn address_present(tx: &TxView<'_>) -> bool {
    tx.property_outputs().all(|p| !p.address.is_empty())
}

fn has_participants(tx: &TxView<'_>) -> bool {
    tx.output_records().all(|r| !r.participants().is_empty())
}

