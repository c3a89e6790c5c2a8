//! Windows UI Automation (UIA) backend for [`UiTree`], plus the async wrapper
//! that runs tree work on a blocking thread.
//!
//! On non-Windows platforms the backend never resolves a foreground window:
//! snapshots are empty and control-targeted actions report not-found.
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent_engine::action::ControlReference;
use crate::errors::{PilotError, PilotResult};
use crate::executor::dispatcher::{act_on_tree, DispatchOutcome};
use crate::perception::traits::{Accessibility, PatternRequest};
use crate::perception::tree::{snapshot, TreeProvider};
use crate::perception::types::UIElement;

// ── Windows implementation ──────────────────────────────────────────────────

#[cfg(target_os = "windows")]
mod win {
    use windows::core::{Interface, BSTR};
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_MULTITHREADED,
    };
    use windows::Win32::UI::Accessibility::{
        CUIAutomation, IUIAutomation, IUIAutomationElement, IUIAutomationInvokePattern,
        IUIAutomationTreeWalker, IUIAutomationValuePattern, UIA_InvokePatternId,
        UIA_ValuePatternId,
    };
    use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

    use crate::errors::{PilotError, PilotResult};
    use crate::perception::tree::{PatternError, TreeProvider, UiTree};
    use crate::perception::types::{ControlType, NodeProperties, Rect};

    /// RAII guard for COM initialization on the current thread.
    struct ComGuard;
    impl ComGuard {
        fn new() -> PilotResult<Self> {
            unsafe {
                CoInitializeEx(None, COINIT_MULTITHREADED)
                    .ok()
                    .map_err(|e| PilotError::Perception(format!("CoInitializeEx: {e}")))?;
            }
            Ok(Self)
        }
    }
    impl Drop for ComGuard {
        fn drop(&mut self) {
            unsafe { CoUninitialize() };
        }
    }

    /// A COM session over the control view. Fields drop in order, so the
    /// guard goes last.
    pub struct UiaTree {
        automation: IUIAutomation,
        walker: IUIAutomationTreeWalker,
        _com: ComGuard,
    }

    #[derive(Debug, Default)]
    pub struct UiaProvider;

    impl TreeProvider for UiaProvider {
        type Tree = UiaTree;

        /// Must be called from a blocking thread (COM is not async-safe).
        fn open(&self) -> PilotResult<UiaTree> {
            let com = ComGuard::new()?;
            let automation: IUIAutomation = unsafe {
                CoCreateInstance(&CUIAutomation, None, CLSCTX_ALL)
                    .map_err(|e| PilotError::Perception(format!("CoCreateInstance UIA: {e}")))?
            };
            let walker = unsafe {
                automation
                    .ControlViewWalker()
                    .map_err(|e| PilotError::Perception(format!("ControlViewWalker: {e}")))?
            };
            Ok(UiaTree {
                automation,
                walker,
                _com: com,
            })
        }
    }

    impl UiTree for UiaTree {
        type Node = IUIAutomationElement;

        fn foreground_root(&self) -> Option<IUIAutomationElement> {
            let hwnd = unsafe { GetForegroundWindow() };
            if hwnd.0.is_null() {
                return None;
            }
            match unsafe { self.automation.ElementFromHandle(hwnd) } {
                Ok(root) => Some(root),
                Err(e) => {
                    // Elevated or foreign processes can refuse introspection.
                    tracing::debug!(error = %e, "ElementFromHandle failed");
                    None
                }
            }
        }

        fn children(&self, node: &IUIAutomationElement) -> Vec<IUIAutomationElement> {
            let mut out = Vec::new();
            let mut next = unsafe { self.walker.GetFirstChildElement(node) }.ok();
            while let Some(child) = next {
                next = unsafe { self.walker.GetNextSiblingElement(&child) }.ok();
                out.push(child);
            }
            out
        }

        fn properties(&self, node: &IUIAutomationElement) -> Option<NodeProperties> {
            let rect = unsafe { node.CurrentBoundingRectangle() }.ok()?;
            let control_type = unsafe { node.CurrentControlType() }.ok()?;
            let name = unsafe { node.CurrentName() }
                .map(|b| b.to_string())
                .unwrap_or_default();
            let automation_id = unsafe { node.CurrentAutomationId() }
                .map(|b| b.to_string())
                .unwrap_or_default();
            let is_offscreen = unsafe { node.CurrentIsOffscreen() }
                .map(|b| b.as_bool())
                .unwrap_or(true);

            Some(NodeProperties {
                name,
                control_type: ControlType::from_uia_id(control_type.0),
                automation_id,
                bounding_rectangle: Rect::from_ltrb(rect.left, rect.top, rect.right, rect.bottom),
                is_offscreen,
            })
        }

        fn invoke(&self, node: &IUIAutomationElement) -> Result<(), PatternError> {
            let pattern = unsafe { node.GetCurrentPattern(UIA_InvokePatternId) }
                .map_err(|_| PatternError::Unavailable)?;
            let invoke: IUIAutomationInvokePattern =
                pattern.cast().map_err(|_| PatternError::Unavailable)?;
            unsafe { invoke.Invoke() }.map_err(|e| PatternError::Failed(e.to_string()))
        }

        fn set_value(&self, node: &IUIAutomationElement, value: &str) -> Result<(), PatternError> {
            let pattern = unsafe { node.GetCurrentPattern(UIA_ValuePatternId) }
                .map_err(|_| PatternError::Unavailable)?;
            let vp: IUIAutomationValuePattern =
                pattern.cast().map_err(|_| PatternError::Unavailable)?;
            let bstr = BSTR::from(value);
            unsafe { vp.SetValue(&bstr) }.map_err(|e| PatternError::Failed(e.to_string()))
        }
    }
}

// ── Fallback for platforms without UIA ──────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod fallback {
    use crate::errors::PilotResult;
    use crate::perception::tree::{PatternError, TreeProvider, UiTree};
    use crate::perception::types::NodeProperties;

    #[derive(Debug, Default)]
    pub struct NullProvider;

    pub struct NullTree;

    impl TreeProvider for NullProvider {
        type Tree = NullTree;

        fn open(&self) -> PilotResult<NullTree> {
            Ok(NullTree)
        }
    }

    impl UiTree for NullTree {
        type Node = ();

        fn foreground_root(&self) -> Option<()> {
            None
        }

        fn children(&self, _node: &()) -> Vec<()> {
            Vec::new()
        }

        fn properties(&self, _node: &()) -> Option<NodeProperties> {
            None
        }

        fn invoke(&self, _node: &()) -> Result<(), PatternError> {
            Err(PatternError::Unavailable)
        }

        fn set_value(&self, _node: &(), _value: &str) -> Result<(), PatternError> {
            Err(PatternError::Unavailable)
        }
    }
}

#[cfg(target_os = "windows")]
pub type PlatformProvider = win::UiaProvider;

#[cfg(not(target_os = "windows"))]
pub type PlatformProvider = fallback::NullProvider;

// ── Async wrapper ───────────────────────────────────────────────────────────

/// Opens a fresh tree for every call; nothing is cached between reads.
pub struct LiveAccessibility<P: TreeProvider> {
    provider: Arc<P>,
}

impl<P: TreeProvider> LiveAccessibility<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

impl LiveAccessibility<PlatformProvider> {
    pub fn platform() -> Self {
        Self::new(PlatformProvider::default())
    }
}

#[async_trait]
impl<P: TreeProvider> Accessibility for LiveAccessibility<P> {
    async fn snapshot(&self) -> PilotResult<Vec<UIElement>> {
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || {
            let tree = provider.open()?;
            Ok(snapshot(&tree))
        })
        .await
        .map_err(|e| PilotError::Perception(format!("join: {e}")))?
    }

    async fn perform(&self, control: &ControlReference, request: PatternRequest) -> DispatchOutcome {
        let provider = self.provider.clone();
        let control = control.clone();
        let joined = tokio::task::spawn_blocking(move || match provider.open() {
            Ok(tree) => act_on_tree(&tree, &control, &request),
            Err(e) => {
                tracing::warn!(error = %e, "could not open accessibility tree for dispatch");
                DispatchOutcome::NotFound
            }
        })
        .await;
        joined.unwrap_or_else(|e| DispatchOutcome::Unsupported {
            reason: format!("join: {e}"),
        })
    }
}
