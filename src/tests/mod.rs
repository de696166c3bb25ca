mod offline_flow;
