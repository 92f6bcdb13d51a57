//! Input and output count predicates shared by every contract.

use crate::TxView;

pub(crate) fn no_inputs(tx: &TxView<'_>) -> bool {
    tx.input_count() == 0
}

pub(crate) fn one_input(tx: &TxView<'_>) -> bool {
    tx.input_count() == 1
}

pub(crate) fn some_inputs(tx: &TxView<'_>) -> bool {
    tx.input_count() >= 1
}

pub(crate) fn no_outputs(tx: &TxView<'_>) -> bool {
    tx.output_count() == 0
}

pub(crate) fn one_output(tx: &TxView<'_>) -> bool {
    tx.output_count() == 1
}

pub(crate) fn some_outputs(tx: &TxView<'_>) -> bool {
    tx.output_count() >= 1
}

pub(crate) fn output_participants_signed(tx: &TxView<'_>) -> bool {
    tx.output_participants_signed()
}
