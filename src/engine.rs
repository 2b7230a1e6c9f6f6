use crate::viewer::ViewerState;

pub fn update(state: &mut ViewerState) {
    state.update();
    state.scene.late_update();
}
