// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface TransactionManager {
        event TransactionSubmitted(bytes32 indexed txId, address indexed submitter, address target);
        event TransactionExecuted(bytes32 indexed txId, bool success);
        event TransactionCancelled(bytes32 indexed txId);

        // Called by upstream clients, never by the keeper.
        function submitTransaction(
            address target,
            bytes calldata data,
            uint256 maxGasPrice,
            uint256 deadline
        ) external returns (bytes32 txId);

        function executeTransaction(bytes32 txId) external;
        function cancelTransaction(bytes32 txId) external;

        function transactionRequests(bytes32 txId)
            external
            view
            returns (
                address submitter,
                address target,
                bytes memory data,
                uint256 maxGasPrice,
                uint256 deadline,
                bool executed
            );
    }
}
