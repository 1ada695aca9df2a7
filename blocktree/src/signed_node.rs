use serde::{Deserialize, Serialize};

use drawtree_crypto::{sign_message, verify_for_account};
use drawtree_types::{NodeHash, PrivateKey, Signature};

use crate::Node;

/// A node plus its signer's signature over the node hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedNode {
    pub node: Node,
    pub signature: Signature,
}

impl SignedNode {
    pub fn sign(node: Node, private_key: &PrivateKey) -> Self {
        let signature = sign_message(node.hash().as_bytes(), private_key);
        Self { node, signature }
    }

    pub fn verify(&self) -> bool {
        verify_for_account(self.hash().as_bytes(), &self.signature, &self.node.peer)
    }

    pub fn hash(&self) -> NodeHash {
        self.node.hash()
    }
}
